//! 请求/响应上下文数据结构

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::model::config::Config;

use super::url::UrlInfo;

/// body 因采集关闭或无法解码而被隐去
pub const REDACTED_MARKER: &str = "[REDACTED]";

/// body 因内容类型（multipart / 二进制流）被丢弃
pub const DISCARDED_MARKER: &str = "[DISCARDED]";

/// 采集到的 body
///
/// 序列化为解码后的文本或对应的标记字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedBody {
    Decoded(String),
    Discarded,
    Redacted,
}

impl CapturedBody {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Decoded(text) => text,
            Self::Discarded => DISCARDED_MARKER,
            Self::Redacted => REDACTED_MARKER,
        }
    }
}

impl Serialize for CapturedBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// 单次采集使用的开关
///
/// 事务与错误事件对 body 的采集规则不同，由 [`Config`] 派生
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub capture_headers: bool,
    pub capture_body: bool,
    /// 视为携带 body 的 HTTP 方法
    pub body_methods: Vec<String>,
}

impl CaptureSettings {
    /// 事务事件的采集规则
    pub fn for_transactions(config: &Config) -> Self {
        Self {
            capture_headers: config.capture_headers,
            capture_body: config.capture_body.for_transactions(),
            body_methods: config.body_methods.clone(),
        }
    }

    /// 错误事件的采集规则
    pub fn for_errors(config: &Config) -> Self {
        Self {
            capture_headers: config.capture_headers,
            capture_body: config.capture_body.for_errors(),
            body_methods: config.body_methods.clone(),
        }
    }

    /// 方法是否被视为携带 body（大小写不敏感）
    pub fn is_body_method(&self, method: &str) -> bool {
        self.body_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }

    /// 该方法的请求 body 是否会被读取
    pub fn wants_request_body(&self, method: &str) -> bool {
        self.capture_body && self.is_body_method(method)
    }
}

/// 应用配置快照，采集时按值合并进请求的 `env`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppConfigSnapshot(BTreeMap<String, String>);

impl AppConfigSnapshot {
    /// 从配置中复制可识别的键以及 `appEnv` 中的自定义项
    pub fn from_config(config: &Config) -> Self {
        let mut entries = config.app_env.clone();
        entries.insert("service_name".to_string(), config.service_name.clone());
        entries.insert("framework_name".to_string(), config.framework_name.clone());
        entries.insert(
            "framework_version".to_string(),
            config.framework_version.clone(),
        );
        if let Some(environment) = &config.environment {
            entries.insert("environment".to_string(), environment.clone());
        }
        Self(entries)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// 连接信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketInfo {
    pub remote_address: String,
    /// scheme 为 https / wss
    pub encrypted: bool,
}

/// 请求上下文
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub env: BTreeMap<String, serde_json::Value>,
    pub method: String,
    pub socket: SocketInfo,
    pub cookies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    pub body: CapturedBody,
    pub url: UrlInfo,
}

/// 响应上下文
#[derive(Debug, Clone, Serialize)]
pub struct ResponseInfo {
    pub cookies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    pub body: CapturedBody,
}
