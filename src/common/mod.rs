//! 公共工具模块

/// keyword 字段的最大字符数
pub const KEYWORD_MAX_LENGTH: usize = 1024;

/// 按字符数截断字符串，确保不会在多字节字符中间截断
///
/// 返回不超过 `max_chars` 个字符的前缀
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// 将字符串规整为 keyword 字段
///
/// 超过 [`KEYWORD_MAX_LENGTH`] 个字符时截断，并以 `…` 结尾（总长度仍为上限）
pub fn keyword_field(s: &str) -> String {
    if s.chars().count() <= KEYWORD_MAX_LENGTH {
        return s.to_string();
    }

    let truncated = truncate_chars(s, KEYWORD_MAX_LENGTH - 1);
    format!("{}…", truncated)
}
