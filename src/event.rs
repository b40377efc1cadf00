//! APM 事务事件

use serde::Serialize;

use crate::capture::{RequestInfo, ResponseInfo};
use crate::model::config::Config;

/// 事务类型
pub const TRANSACTION_TYPE_REQUEST: &str = "request";

/// 框架信息
#[derive(Debug, Clone, Serialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub version: String,
}

impl FrameworkInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.framework_name.clone(),
            version: config.framework_version.clone(),
        }
    }
}

/// 事务上下文
#[derive(Debug, Clone, Serialize)]
pub struct TransactionContext {
    pub request: RequestInfo,
    pub response: ResponseInfo,
}

/// 一次请求/响应对应的事务
#[derive(Debug, Clone, Serialize)]
pub struct TransactionEvent {
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub result: String,
    /// RFC3339
    pub timestamp: String,
    pub duration_ms: f64,
    pub sampled: bool,
    pub service_name: String,
    pub framework: FrameworkInfo,
    pub context: TransactionContext,
}

/// 事务名：`<METHOD> <路由模板>`，没有匹配到路由时为空
pub fn build_transaction_name(method: &str, route: Option<&str>) -> String {
    match route.filter(|r| !r.is_empty()) {
        Some(route) => format!("{} {}", method, route),
        None => String::new(),
    }
}

/// 事务结果：`HTTP 2xx` 这样的状态码分组
pub fn transaction_result(status: u16) -> String {
    format!("HTTP {}xx", status / 100)
}
