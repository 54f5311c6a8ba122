//! JSON 路径定位
//!
//! 收集器生成的路径形如 `a.b[2]`、`['data-x'].label`，可带 `$` 前缀。
//! 点号后的段总是对象键，方括号中的数字总是数组下标，带引号的方括号
//! 段用于含有非单词字符的键。

use serde_json::Value;

use crate::translation::error::PathError;

/// 路径段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// 在已有路径后追加对象键
pub fn push_key(path: &str, key: &str) -> String {
    let is_word = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    if is_word {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", path, key)
        }
    } else {
        let escaped = key.replace('\\', "\\\\").replace('\'', "\\'");
        format!("{}['{}']", path, escaped)
    }
}

/// 在已有路径后追加数组下标
pub fn push_index(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

/// 解析路径
pub fn parse(path: &str) -> Result<Vec<Segment>, PathError> {
    let syntax = |reason: &str| PathError::Syntax {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut rest = path.strip_prefix('$').unwrap_or(path);
    let mut segments = Vec::new();
    let mut first = true;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            if let Some(quote) = after.chars().next().filter(|c| *c == '\'' || *c == '"') {
                let (key, consumed) =
                    read_quoted(&after[1..], quote).ok_or_else(|| syntax("未闭合的引号"))?;
                let tail = &after[1 + consumed..];
                rest = tail.strip_prefix(']').ok_or_else(|| syntax("引号键后缺少 `]`"))?;
                segments.push(Segment::Key(key));
            } else {
                let end = after.find(']').ok_or_else(|| syntax("缺少 `]`"))?;
                let index = after[..end]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| syntax("数组下标不是非负整数"))?;
                segments.push(Segment::Index(index));
                rest = &after[end + 1..];
            }
        } else {
            let body = match rest.strip_prefix('.') {
                Some(body) => body,
                None if first => rest,
                None => return Err(syntax("段之间缺少 `.`")),
            };
            let end = body.find(['.', '[']).unwrap_or(body.len());
            if end == 0 {
                return Err(syntax("空的键名"));
            }
            segments.push(Segment::Key(body[..end].to_string()));
            rest = &body[end..];
        }
        first = false;
    }

    Ok(segments)
}

/// 读取引号内容，返回 (内容, 包含结束引号在内消耗的字节数)
fn read_quoted(input: &str, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(escaped);
            }
            c if c == quote => return Some((value, i + c.len_utf8())),
            c => value.push(c),
        }
    }

    None
}

/// 读取路径指向的值
pub fn get<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    let mut current = root;
    for segment in parse(path)? {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(&key),
            (Segment::Index(index), Value::Array(items)) => items.get(index),
            _ => None,
        }
        .ok_or_else(|| PathError::Missing {
            path: path.to_string(),
        })?;
    }
    Ok(current)
}

/// 将路径指向的字符串替换为新值
///
/// 目标必须已经存在且为字符串；写回假设树的形状与收集时一致。
pub fn set(root: &mut Value, path: &str, new_value: String) -> Result<(), PathError> {
    let mut current = root;
    for segment in parse(path)? {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(&key),
            (Segment::Index(index), Value::Array(items)) => items.get_mut(index),
            _ => None,
        }
        .ok_or_else(|| PathError::Missing {
            path: path.to_string(),
        })?;
    }

    match current {
        Value::String(existing) => {
            *existing = new_value;
            Ok(())
        }
        _ => Err(PathError::NotAString {
            path: path.to_string(),
        }),
    }
}
