//! axum 请求/响应适配
//!
//! 中间件先把需要采集的 body 缓冲下来，再用这里的类型包装，
//! 采集逻辑通过 [`RequestSource`] / [`ResponseSource`] 读取。

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use bytes::Bytes;
use http::header::{FORWARDED, HOST, SET_COOKIE, UPGRADE};
use http::uri::Authority;
use http::{HeaderMap, Method, StatusCode, Uri, Version, request, response};

use super::source::{HeaderSource, RequestSource, ResponseSource};
use super::types::AppConfigSnapshot;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_PORT: &str = "x-forwarded-port";
const X_REAL_IP: &str = "x-real-ip";

/// axum 入站请求的只读视图
#[derive(Debug, Clone)]
pub struct AxumRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    scheme: String,
    peer: Option<SocketAddr>,
    body: Bytes,
    app_config: AppConfigSnapshot,
}

impl AxumRequest {
    /// 从请求头部创建；`body` 为已缓冲的请求体（未缓冲时传空）
    ///
    /// 对端地址取自 `ConnectInfo<SocketAddr>` 扩展
    pub fn from_parts(parts: &request::Parts, body: Bytes) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            scheme: detect_scheme(&parts.uri, &parts.headers),
            peer,
            body,
            app_config: AppConfigSnapshot::default(),
        }
    }

    /// 设置附加到 env 的应用配置快照
    pub fn with_app_config(mut self, snapshot: AppConfigSnapshot) -> Self {
        self.app_config = snapshot;
        self
    }

    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 请求的 authority：绝对 URI 优先，其次 Host 头
    fn authority(&self) -> Option<Authority> {
        if let Some(authority) = self.uri.authority() {
            return Some(authority.clone());
        }
        self.headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|host| host.parse::<Authority>().ok())
    }
}

/// 推断请求 scheme
///
/// 绝对 URI 的 scheme > X-Forwarded-Proto > http；WebSocket 升级请求映射为 ws / wss
fn detect_scheme(uri: &Uri, headers: &HeaderMap) -> String {
    let scheme = uri
        .scheme_str()
        .map(str::to_ascii_lowercase)
        .or_else(|| {
            headers
                .get(X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
        })
        .unwrap_or_else(|| "http".to_string());

    let is_websocket = headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    match (scheme.as_str(), is_websocket) {
        ("http", true) => "ws".to_string(),
        ("https", true) => "wss".to_string(),
        _ => scheme,
    }
}

/// 取 RFC 7239 Forwarded 头第一跳的 `for=` 节点
fn forwarded_node(value: &str) -> Option<String> {
    let first_hop = value.split(',').next()?;
    first_hop.split(';').find_map(|pair| {
        let (key, node) = pair.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("for")
            .then(|| node.trim().trim_matches('"').to_string())
    })
}

impl HeaderSource for AxumRequest {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl RequestSource for AxumRequest {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn server_name(&self) -> Option<String> {
        self.authority().map(|authority| {
            authority
                .host()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string()
        })
    }

    fn server_port(&self) -> Option<u16> {
        self.authority()
            .and_then(|authority| authority.port_u16())
            .or(match self.scheme.as_str() {
                "http" | "ws" => Some(80),
                "https" | "wss" => Some(443),
                _ => None,
            })
    }

    fn version(&self) -> Option<String> {
        Some(format!("{:?}", self.version))
    }

    fn app_config(&self) -> AppConfigSnapshot {
        self.app_config.clone()
    }

    fn cookies(&self) -> BTreeMap<String, String> {
        CookieJar::from_headers(&self.headers)
            .iter()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect()
    }

    fn body(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send {
        let body = self.body.clone();
        async move { Ok(body) }
    }

    fn url(&self) -> String {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            return self.uri.to_string();
        }

        let path_and_query = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        match self.authority() {
            Some(authority) => format!("{}://{}{}", self.scheme, authority, path_and_query),
            None => path_and_query.to_string(),
        }
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn forwarded_for(&self) -> Option<&str> {
        self.header_str(X_FORWARDED_FOR)
    }

    fn socket(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn ip(&self) -> Option<String> {
        self.header_str(X_REAL_IP)
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }

    fn port(&self) -> Option<u16> {
        self.header_str(X_FORWARDED_PORT)
            .and_then(|port| port.trim().parse().ok())
    }

    fn remote_addr(&self) -> String {
        self.headers
            .get(FORWARDED)
            .and_then(|v| v.to_str().ok())
            .and_then(forwarded_node)
            .unwrap_or_default()
    }
}

/// axum 出站响应的只读视图
#[derive(Debug, Clone)]
pub struct AxumResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl AxumResponse {
    /// 从响应头部创建；`body` 为已缓冲的响应体（未缓冲时传空）
    pub fn from_parts(parts: &response::Parts, body: Bytes) -> Self {
        Self {
            status: parts.status,
            headers: parts.headers.clone(),
            body,
        }
    }
}

impl HeaderSource for AxumResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl ResponseSource for AxumResponse {
    /// 解析所有 Set-Cookie 头，无法解析的忽略
    fn cookies(&self) -> BTreeMap<String, String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|raw| Cookie::parse(raw).ok())
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect()
    }

    fn status(&self) -> Option<u16> {
        Some(self.status.as_u16())
    }

    fn body(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send {
        let body = self.body.clone();
        async move { Ok(body) }
    }
}
