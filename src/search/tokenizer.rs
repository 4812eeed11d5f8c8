//! Query / word normalization / 查询与单词规范化

/// Trim and lower-case; `None` when nothing is left / 去除空白并转小写
pub fn normalize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}
