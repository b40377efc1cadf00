//! 请求/响应元数据采集
//!
//! 从框架的请求/响应对象中读取头部、Cookie、body 和客户端地址，
//! 组装成 APM 事件的 `request` / `response` 上下文。

pub mod adapter;
pub mod headers;
pub mod request;
pub mod response;
pub mod source;
pub mod types;
pub mod url;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{AxumRequest, AxumResponse};
pub use headers::extract_headers;
pub use request::{
    build_request_info, decode_body, extract_environment, is_discarded_content_type,
    resolve_client_address,
};
pub use response::build_response_info;
pub use source::{HeaderSource, RequestSource, ResponseSource};
pub use types::{
    AppConfigSnapshot, CaptureSettings, CapturedBody, DISCARDED_MARKER, REDACTED_MARKER,
    RequestInfo, ResponseInfo, SocketInfo,
};
pub use url::{UrlInfo, url_info};
