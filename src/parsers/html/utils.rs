/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 判断字符串是否含有 ASCII 空白
pub fn has_whitespace(text: &str) -> bool {
    text.contains(WHITESPACES)
}
