//! 框架对象访问接口
//!
//! 采集逻辑只通过这些 trait 读取请求/响应，框架适配层负责实现。
//! 可选属性返回 `Option`，缺失即视为不存在，不是错误。

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;

use super::types::AppConfigSnapshot;

/// 带有头部的实体（请求或响应）
pub trait HeaderSource {
    fn headers(&self) -> &HeaderMap;

    /// Content-Type，缺失时为空字符串
    fn content_type(&self) -> &str {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// 入站请求
pub trait RequestSource: HeaderSource {
    fn method(&self) -> &str;

    fn server_name(&self) -> Option<String> {
        None
    }

    fn server_port(&self) -> Option<u16> {
        None
    }

    /// HTTP 协议版本，如 `HTTP/1.1`
    fn version(&self) -> Option<String> {
        None
    }

    fn app_config(&self) -> AppConfigSnapshot {
        AppConfigSnapshot::default()
    }

    fn cookies(&self) -> BTreeMap<String, String>;

    /// 原始 body，可能需要等待框架读完
    fn body(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send;

    fn url(&self) -> String;

    fn scheme(&self) -> &str;

    /// X-Forwarded-For 原始值
    fn forwarded_for(&self) -> Option<&str> {
        None
    }

    /// 对端地址，`None` 表示连接信息不可用
    fn socket(&self) -> Option<SocketAddr> {
        None
    }

    fn ip(&self) -> Option<String> {
        None
    }

    fn port(&self) -> Option<u16> {
        None
    }

    fn remote_addr(&self) -> String {
        String::new()
    }
}

/// 出站响应
pub trait ResponseSource: HeaderSource {
    fn cookies(&self) -> BTreeMap<String, String>;

    /// 整数状态码；框架给出非整数状态时返回 `None`
    fn status(&self) -> Option<u16>;

    fn body(&self) -> impl Future<Output = anyhow::Result<Bytes>> + Send;
}
