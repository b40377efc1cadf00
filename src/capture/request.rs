//! 请求上下文采集

use std::collections::BTreeMap;
use std::str::Utf8Error;

use serde_json::Value;

use super::headers::extract_headers;
use super::source::RequestSource;
use super::types::{CaptureSettings, CapturedBody, RequestInfo, SocketInfo};
use super::url::url_info;

/// 解码 body 为 UTF-8 文本
pub fn decode_body(raw: &[u8]) -> Result<String, Utf8Error> {
    std::str::from_utf8(raw).map(str::to_string)
}

/// multipart 或二进制流，body 不采集
pub fn is_discarded_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.starts_with("multipart") || content_type.contains("octet-stream")
}

/// 按固定顺序（server_name、server_port、version）收集请求暴露的环境属性
pub fn extract_environment<R: RequestSource + ?Sized>(request: &R) -> Vec<(&'static str, Value)> {
    let mut env = Vec::with_capacity(3);
    if let Some(server_name) = request.server_name() {
        env.push(("server_name", Value::from(server_name)));
    }
    if let Some(server_port) = request.server_port() {
        env.push(("server_port", Value::from(server_port)));
    }
    if let Some(version) = request.version() {
        env.push(("version", Value::from(version)));
    }
    env
}

/// 解析客户端地址
///
/// 优先级：X-Forwarded-For 第一跳 > 对端 socket > ip/port 属性 > remote_addr
pub fn resolve_client_address<R: RequestSource + ?Sized>(request: &R) -> String {
    if let Some(forwarded) = request.forwarded_for().filter(|f| !f.trim().is_empty()) {
        let first_hop = forwarded.split(',').next().unwrap_or("");
        return first_hop.trim().to_string();
    }

    if let Some(addr) = request.socket() {
        return format!("{}:{}", addr.ip(), addr.port());
    }

    match (request.ip(), request.port()) {
        (Some(ip), Some(port)) if !ip.is_empty() && port != 0 => format!("{}:{}", ip, port),
        _ => request.remote_addr(),
    }
}

/// 采集请求上下文
///
/// 只有 body 方法且开启 body 采集时才读取 body：
/// multipart / 二进制流直接标记为 `[DISCARDED]`，不再尝试解码；
/// 解码失败以及未采集的情况统一为 `[REDACTED]`。
/// 读取 body 时框架返回的错误原样向上传递。
pub async fn build_request_info<R: RequestSource + Sync + ?Sized>(
    settings: &CaptureSettings,
    request: &R,
    skip_headers: Option<&[String]>,
) -> anyhow::Result<RequestInfo> {
    let mut env: BTreeMap<String, Value> = extract_environment(request)
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    for (key, value) in request.app_config().iter() {
        env.insert(key.clone(), Value::from(value.as_str()));
    }

    let headers = settings
        .capture_headers
        .then(|| extract_headers(request, skip_headers));

    let mut body = None;
    if settings.wants_request_body(request.method()) {
        if is_discarded_content_type(request.content_type()) {
            body = Some(CapturedBody::Discarded);
        } else {
            let raw = request.body().await?;
            match decode_body(&raw) {
                Ok(text) => body = Some(CapturedBody::Decoded(text)),
                Err(e) => tracing::debug!("请求 body 不是有效的 UTF-8，已隐去: {}", e),
            }
        }
    }

    Ok(RequestInfo {
        env,
        method: request.method().to_string(),
        socket: SocketInfo {
            remote_address: resolve_client_address(request),
            encrypted: matches!(request.scheme(), "https" | "wss"),
        },
        cookies: request.cookies(),
        headers,
        body: body.unwrap_or(CapturedBody::Redacted),
        url: url_info(&request.url()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::FakeRequest;
    use crate::capture::types::{AppConfigSnapshot, DISCARDED_MARKER, REDACTED_MARKER};

    fn settings(capture_headers: bool, capture_body: bool) -> CaptureSettings {
        CaptureSettings {
            capture_headers,
            capture_body,
            body_methods: vec!["POST".to_string(), "PUT".to_string()],
        }
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("héllo".as_bytes()).unwrap(), "héllo");
        assert!(decode_body(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_discarded_content_types() {
        assert!(is_discarded_content_type("multipart/form-data; boundary=x"));
        assert!(is_discarded_content_type("application/octet-stream"));
        assert!(!is_discarded_content_type("application/json"));
        assert!(!is_discarded_content_type(""));
    }

    #[test]
    fn test_environment_keeps_fixed_order() {
        let request = FakeRequest::new("GET")
            .server_name("api.local")
            .server_port(8080)
            .version("HTTP/1.1");
        let env = extract_environment(&request);
        let names: Vec<_> = env.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["server_name", "server_port", "version"]);
        assert_eq!(env[1].1, Value::from(8080));
    }

    /// 缺少 version 时只返回存在的属性
    #[test]
    fn test_environment_skips_missing_attributes() {
        let request = FakeRequest::new("GET").server_name("api.local").server_port(80);
        let env = extract_environment(&request);
        let names: Vec<_> = env.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["server_name", "server_port"]);
    }

    #[test]
    fn test_client_address_prefers_forwarded_for() {
        let request = FakeRequest::new("GET")
            .forwarded_for("1.2.3.4, 5.6.7.8")
            .socket("9.9.9.9:80");
        assert_eq!(resolve_client_address(&request), "1.2.3.4");
    }

    #[test]
    fn test_client_address_from_socket() {
        let request = FakeRequest::new("GET").socket("9.9.9.9:80");
        assert_eq!(resolve_client_address(&request), "9.9.9.9:80");
    }

    #[test]
    fn test_client_address_from_ip_and_port() {
        let request = FakeRequest::new("GET").ip("7.7.7.7").port(8080);
        assert_eq!(resolve_client_address(&request), "7.7.7.7:8080");
    }

    /// ip 与 port 缺一不可，否则回退到 remote_addr
    #[test]
    fn test_client_address_falls_back_to_remote_addr() {
        let request = FakeRequest::new("GET").ip("7.7.7.7").remote_addr("10.0.0.1");
        assert_eq!(resolve_client_address(&request), "10.0.0.1");

        let request = FakeRequest::new("GET");
        assert_eq!(resolve_client_address(&request), "");
    }

    #[tokio::test]
    async fn test_body_redacted_when_capture_disabled() {
        let request = FakeRequest::new("POST")
            .content_type("application/json")
            .body(r#"{"a":1}"#);
        let info = build_request_info(&settings(true, false), &request, None)
            .await
            .unwrap();
        assert_eq!(info.body.as_str(), REDACTED_MARKER);
    }

    #[tokio::test]
    async fn test_body_redacted_for_non_body_method() {
        let request = FakeRequest::new("GET").body("ignored");
        let info = build_request_info(&settings(true, true), &request, None)
            .await
            .unwrap();
        assert_eq!(info.body, CapturedBody::Redacted);
    }

    #[tokio::test]
    async fn test_body_discarded_for_multipart_and_octet_stream() {
        for content_type in ["multipart/form-data; boundary=abc", "application/octet-stream"] {
            let request = FakeRequest::new("POST")
                .content_type(content_type)
                .body("plain text that would decode");
            let info = build_request_info(&settings(true, true), &request, None)
                .await
                .unwrap();
            assert_eq!(info.body.as_str(), DISCARDED_MARKER);
        }
    }

    #[tokio::test]
    async fn test_body_decoded() {
        let request = FakeRequest::new("put")
            .content_type("application/json")
            .body(r#"{"name":"测试"}"#);
        let info = build_request_info(&settings(true, true), &request, None)
            .await
            .unwrap();
        assert_eq!(info.body, CapturedBody::Decoded(r#"{"name":"测试"}"#.to_string()));
    }

    /// 没有 Content-Type 时按普通 body 解码，不视为二进制
    #[tokio::test]
    async fn test_body_without_content_type_decoded() {
        let request = FakeRequest::new("POST").body("name=value");
        let info = build_request_info(&settings(false, true), &request, None)
            .await
            .unwrap();
        assert_eq!(info.body, CapturedBody::Decoded("name=value".to_string()));
    }

    /// 非法 UTF-8 不报错，body 回落为 [REDACTED]
    #[tokio::test]
    async fn test_invalid_utf8_body_redacted() {
        let request = FakeRequest::new("POST")
            .content_type("text/plain")
            .raw_body(vec![0xc3, 0x28, 0xff]);
        let info = build_request_info(&settings(true, true), &request, None)
            .await
            .unwrap();
        assert_eq!(info.body, CapturedBody::Redacted);
    }

    /// 框架读取 body 的错误原样传递
    #[tokio::test]
    async fn test_body_read_error_propagates() {
        let request = FakeRequest::new("POST").failing_body();
        let result = build_request_info(&settings(true, true), &request, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_headers_only_when_enabled() {
        let request = FakeRequest::new("GET")
            .header("x-request-id", "abc")
            .header("authorization", "Bearer secret");

        let info = build_request_info(&settings(false, false), &request, None)
            .await
            .unwrap();
        assert!(info.headers.is_none());
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("headers").is_none());

        let skip = vec!["Authorization".to_string()];
        let info = build_request_info(&settings(true, false), &request, Some(&skip))
            .await
            .unwrap();
        let headers = info.headers.unwrap();
        assert_eq!(headers.get("x-request-id").map(String::as_str), Some("abc"));
        assert!(!headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_env_socket_cookies_and_url() {
        let mut snapshot = AppConfigSnapshot::default();
        snapshot.insert("service_name", "orders");
        let request = FakeRequest::new("GET")
            .server_name("api.local")
            .scheme("wss")
            .socket("9.9.9.9:443")
            .cookie("session", "s1")
            .app_config(snapshot)
            .url("wss://api.local/stream?topic=a");

        let info = build_request_info(&settings(true, true), &request, None)
            .await
            .unwrap();

        assert_eq!(info.env["server_name"], Value::from("api.local"));
        assert_eq!(info.env["service_name"], Value::from("orders"));
        assert_eq!(info.method, "GET");
        assert_eq!(info.socket.remote_address, "9.9.9.9:443");
        assert!(info.socket.encrypted);
        assert_eq!(info.cookies["session"], "s1");
        assert_eq!(info.url.pathname, "/stream");
        assert_eq!(info.url.search.as_deref(), Some("?topic=a"));
    }
}
