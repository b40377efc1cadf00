//! 测试用的请求/响应替身

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};

use super::source::{HeaderSource, RequestSource, ResponseSource};
use super::types::AppConfigSnapshot;

#[derive(Default)]
pub struct FakeRequest {
    method: String,
    headers: HeaderMap,
    server_name: Option<String>,
    server_port: Option<u16>,
    version: Option<String>,
    app_config: AppConfigSnapshot,
    cookies: BTreeMap<String, String>,
    body: Bytes,
    body_fails: bool,
    url: String,
    scheme: String,
    forwarded_for: Option<String>,
    socket: Option<SocketAddr>,
    ip: Option<String>,
    port: Option<u16>,
    remote_addr: String,
}

impl FakeRequest {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            url: "http://localhost/".to_string(),
            scheme: "http".to_string(),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }

    pub fn content_type(self, value: &'static str) -> Self {
        self.header("content-type", value)
    }

    pub fn server_name(mut self, value: &str) -> Self {
        self.server_name = Some(value.to_string());
        self
    }

    pub fn server_port(mut self, value: u16) -> Self {
        self.server_port = Some(value);
        self
    }

    pub fn version(mut self, value: &str) -> Self {
        self.version = Some(value.to_string());
        self
    }

    pub fn app_config(mut self, snapshot: AppConfigSnapshot) -> Self {
        self.app_config = snapshot;
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, text: &str) -> Self {
        self.body = Bytes::from(text.to_string());
        self
    }

    pub fn raw_body(mut self, raw: Vec<u8>) -> Self {
        self.body = Bytes::from(raw);
        self
    }

    pub fn failing_body(mut self) -> Self {
        self.body_fails = true;
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn forwarded_for(mut self, value: &str) -> Self {
        self.forwarded_for = Some(value.to_string());
        self
    }

    pub fn socket(mut self, addr: &str) -> Self {
        self.socket = addr.parse().ok();
        self
    }

    pub fn ip(mut self, ip: &str) -> Self {
        self.ip = Some(ip.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn remote_addr(mut self, addr: &str) -> Self {
        self.remote_addr = addr.to_string();
        self
    }
}

impl HeaderSource for FakeRequest {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl RequestSource for FakeRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn server_name(&self) -> Option<String> {
        self.server_name.clone()
    }

    fn server_port(&self) -> Option<u16> {
        self.server_port
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn app_config(&self) -> AppConfigSnapshot {
        self.app_config.clone()
    }

    fn cookies(&self) -> BTreeMap<String, String> {
        self.cookies.clone()
    }

    fn body(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send {
        let result = if self.body_fails {
            Err(anyhow::anyhow!("connection reset while reading body"))
        } else {
            Ok(self.body.clone())
        };
        async move { result }
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn forwarded_for(&self) -> Option<&str> {
        self.forwarded_for.as_deref()
    }

    fn socket(&self) -> Option<SocketAddr> {
        self.socket
    }

    fn ip(&self) -> Option<String> {
        self.ip.clone()
    }

    fn port(&self) -> Option<u16> {
        self.port
    }

    fn remote_addr(&self) -> String {
        self.remote_addr.clone()
    }
}

#[derive(Default)]
pub struct FakeResponse {
    headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    status: Option<u16>,
    body: Bytes,
}

impl FakeResponse {
    pub fn new(status: Option<u16>) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }

    pub fn content_type(self, value: &'static str) -> Self {
        self.header("content-type", value)
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, raw: impl Into<Bytes>) -> Self {
        self.body = raw.into();
        self
    }
}

impl HeaderSource for FakeResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl ResponseSource for FakeResponse {
    fn cookies(&self) -> BTreeMap<String, String> {
        self.cookies.clone()
    }

    fn status(&self) -> Option<u16> {
        self.status
    }

    fn body(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send {
        let body = self.body.clone();
        async move { Ok(body) }
    }
}
