//! W3C `traceparent` 头解析

use std::fmt;

/// 分布式追踪上下文头
pub const TRACEPARENT_HEADER: &str = "traceparent";

const SUPPORTED_VERSION: u8 = 0;
const SAMPLED_FLAG: u8 = 0x01;

/// traceparent 解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceParentError {
    /// 字段数不是 4 个
    Malformed,
    UnsupportedVersion(String),
    InvalidTraceId,
    InvalidSpanId,
    InvalidFlags,
}

impl fmt::Display for TraceParentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "traceparent 格式错误"),
            Self::UnsupportedVersion(v) => write!(f, "不支持的 traceparent 版本: {}", v),
            Self::InvalidTraceId => write!(f, "无效的 trace-id"),
            Self::InvalidSpanId => write!(f, "无效的 parent-id"),
            Self::InvalidFlags => write!(f, "无效的 trace-flags"),
        }
    }
}

impl std::error::Error for TraceParentError {}

/// traceparent 上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceParent {
    /// 32 位小写十六进制
    pub trace_id: String,
    /// 16 位小写十六进制
    pub span_id: String,
    pub flags: u8,
}

/// 解码固定长度的小写十六进制字段，全零视为无效
fn decode_id(field: &str, len: usize) -> Option<Vec<u8>> {
    if field.len() != len || field.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let bytes = hex::decode(field).ok()?;
    (!bytes.iter().all(|b| *b == 0)).then_some(bytes)
}

fn new_span_id() -> String {
    format!("{:016x}", fastrand::u64(1..))
}

impl TraceParent {
    /// 解析 `00-<trace-id>-<parent-id>-<flags>`
    pub fn parse(header: &str) -> Result<Self, TraceParentError> {
        let fields: Vec<&str> = header.trim().split('-').collect();
        let [version, trace_id, span_id, flags] = fields.as_slice() else {
            return Err(TraceParentError::Malformed);
        };

        match hex::decode(version).ok().as_deref() {
            Some([SUPPORTED_VERSION]) => {}
            _ => return Err(TraceParentError::UnsupportedVersion(version.to_string())),
        }

        decode_id(trace_id, 32).ok_or(TraceParentError::InvalidTraceId)?;
        decode_id(span_id, 16).ok_or(TraceParentError::InvalidSpanId)?;

        let flags = match hex::decode(flags).ok().as_deref() {
            Some([flags]) => *flags,
            _ => return Err(TraceParentError::InvalidFlags),
        };

        Ok(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            flags,
        })
    }

    /// 新建一条采样的根追踪
    pub fn new_root() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
            flags: SAMPLED_FLAG,
        }
    }

    /// 同一追踪下的子 span
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
            flags: self.flags,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & SAMPLED_FLAG != 0
    }
}

impl fmt::Display for TraceParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}-{}-{}-{:02x}",
            SUPPORTED_VERSION, self.trace_id, self.span_id, self.flags
        )
    }
}
