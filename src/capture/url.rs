//! URL 结构化拆分

use http::Uri;
use serde::Serialize;

use crate::common::keyword_field;

/// 结构化 URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlInfo {
    pub full: String,
    /// scheme 加冒号，如 `https:`
    pub protocol: String,
    pub hostname: String,
    /// 仅当 URL 中显式给出端口时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub pathname: String,
    /// `?` 加查询串，仅当存在查询时出现
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// 将 URL 拆分为结构化字段
///
/// 无法解析的 URL 原样作为 `full` 和 `pathname`
pub fn url_info(url: &str) -> UrlInfo {
    let Ok(uri) = url.parse::<Uri>() else {
        return UrlInfo {
            full: keyword_field(url),
            protocol: String::new(),
            hostname: String::new(),
            port: None,
            pathname: keyword_field(url),
            search: None,
        };
    };

    let protocol = uri
        .scheme_str()
        .map(|scheme| format!("{}:", scheme))
        .unwrap_or_default();
    let hostname = uri
        .host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
        .unwrap_or("");

    UrlInfo {
        full: keyword_field(url),
        protocol,
        hostname: keyword_field(hostname),
        port: uri.port_u16(),
        pathname: keyword_field(uri.path()),
        search: uri
            .query()
            .filter(|query| !query.is_empty())
            .map(|query| keyword_field(&format!("?{}", query))),
    }
}
