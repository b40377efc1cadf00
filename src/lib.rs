//! axum 应用的 APM 请求/响应采集
//!
//! - [`capture`]：从请求/响应中提取头部、Cookie、body、客户端地址
//! - [`middleware`]：按请求生成事务事件
//! - [`sink`]：把事件交给外部 APM 客户端

pub mod capture;
pub mod common;
pub mod event;
pub mod middleware;
pub mod model;
pub mod sink;
pub mod trace_parent;

pub use middleware::{ApmState, apm_middleware, capture_error_context};
pub use model::config::{CaptureBody, Config};
pub use sink::{ChannelSink, LogSink, TransactionSink};
