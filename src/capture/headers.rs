//! 头部复制与过滤

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::source::HeaderSource;

/// 复制实体的全部头部，并移除 `skip_headers` 中列出的项
///
/// 头部名统一为小写；同名头部以 `", "` 连接。
/// 跳过列表大小写不敏感，列出但不存在的头部直接忽略。
pub fn extract_headers<E: HeaderSource + ?Sized>(
    entity: &E,
    skip_headers: Option<&[String]>,
) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in entity.headers() {
        let value = String::from_utf8_lossy(value.as_bytes());
        match headers.entry(name.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                let joined = entry.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }

    if let Some(skip_headers) = skip_headers {
        for name in skip_headers {
            headers.remove(&name.to_ascii_lowercase());
        }
    }
    headers
}
