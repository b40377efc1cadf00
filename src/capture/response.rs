//! 响应上下文采集

use super::headers::extract_headers;
use super::request::decode_body;
use super::source::ResponseSource;
use super::types::{CaptureSettings, CapturedBody, ResponseInfo};

/// 采集响应上下文
///
/// 开启 body 采集且内容不是二进制流时解码 body，否则为 `[REDACTED]`；
/// 解码失败同样回落为 `[REDACTED]`。
pub async fn build_response_info<R: ResponseSource + Sync + ?Sized>(
    settings: &CaptureSettings,
    response: &R,
    skip_headers: Option<&[String]>,
) -> anyhow::Result<ResponseInfo> {
    let headers = settings
        .capture_headers
        .then(|| extract_headers(response, skip_headers));

    let body = if settings.capture_body
        && !response
            .content_type()
            .to_ascii_lowercase()
            .contains("octet-stream")
    {
        let raw = response.body().await?;
        match decode_body(&raw) {
            Ok(text) => CapturedBody::Decoded(text),
            Err(e) => {
                tracing::debug!("响应 body 不是有效的 UTF-8，已隐去: {}", e);
                CapturedBody::Redacted
            }
        }
    } else {
        CapturedBody::Redacted
    };

    Ok(ResponseInfo {
        cookies: response.cookies(),
        status_code: response.status(),
        headers,
        body,
    })
}
