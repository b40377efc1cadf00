use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Body 采集模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureBody {
    /// 不采集
    #[default]
    Off,
    /// 仅错误事件
    Errors,
    /// 仅事务事件
    Transactions,
    /// 全部
    All,
}

impl CaptureBody {
    /// 事务事件是否采集 body
    pub fn for_transactions(self) -> bool {
        matches!(self, Self::Transactions | Self::All)
    }

    /// 错误事件是否采集 body
    pub fn for_errors(self) -> bool {
        matches!(self, Self::Errors | Self::All)
    }
}

/// APM 采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 服务名称（上报到 APM 后端）
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// 部署环境（可选，如 production / staging）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default = "default_framework_name")]
    pub framework_name: String,

    #[serde(default = "default_framework_version")]
    pub framework_version: String,

    /// 是否采集请求/响应头
    #[serde(default = "default_capture_headers")]
    pub capture_headers: bool,

    /// Body 采集模式
    #[serde(default)]
    pub capture_body: CaptureBody,

    /// 视为携带 body 的 HTTP 方法
    #[serde(default = "default_body_methods")]
    pub body_methods: Vec<String>,

    /// 采集时移除的头（大小写不敏感）
    #[serde(default)]
    pub skip_headers: Vec<String>,

    /// 是否启用请求插桩
    #[serde(default = "default_instrument")]
    pub instrument: bool,

    /// APM 调试模式，应用处于 debug 时仍然采集
    #[serde(default)]
    pub debug: bool,

    /// 应用自身是否处于 debug 模式
    #[serde(default)]
    pub app_debug: bool,

    /// 缓冲 body 的最大字节数
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// 事件通道容量
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// 附加到请求 env 的应用配置项
    #[serde(default)]
    pub app_env: BTreeMap<String, String>,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_service_name() -> String {
    "axum-app".to_string()
}

fn default_framework_name() -> String {
    "axum".to_string()
}

fn default_framework_version() -> String {
    "0.8".to_string()
}

fn default_capture_headers() -> bool {
    true
}

fn default_body_methods() -> Vec<String> {
    ["POST", "PUT", "PATCH", "DELETE"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_instrument() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            service_name: default_service_name(),
            environment: None,
            framework_name: default_framework_name(),
            framework_version: default_framework_version(),
            capture_headers: default_capture_headers(),
            capture_body: CaptureBody::default(),
            body_methods: default_body_methods(),
            skip_headers: Vec::new(),
            instrument: default_instrument(),
            debug: false,
            app_debug: false,
            max_body_bytes: default_max_body_bytes(),
            channel_capacity: default_channel_capacity(),
            app_env: BTreeMap::new(),
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 是否对请求进行插桩
    ///
    /// 应用处于 debug 模式时，只有开启了 APM 的 debug 才继续采集
    pub fn should_instrument(&self) -> bool {
        self.instrument && (!self.app_debug || self.debug)
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
