//! HTML 实体与脚本内容保护
//!
//! DOM 解析/序列化会改写实体（`&nbsp;` 变成不间断空格、`&#39;` 变成 `'`）
//! 并按自己的规则处理 `<script>` 内容。`protect` 在解析前把这些内容换成
//! 哨兵记号，`restore` 在序列化之后换回原样，使往返对任意内容都无损。

use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use markup5ever::data::NAMED_ENTITIES;
use regex::{Captures, Regex};

/// 脚本类容器标签，内容在往返期间整体保留
pub const PRESERVED_TAGS: &[&str] = &["script", "style", "noscript", "template", "textarea"];

const ENTITY_TOKEN: &str = "lng-ent:";
const PRESERVE_TOKEN: &str = "lng-preserve:";

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").expect("valid entity regex")
    })
}

fn entity_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{lng-ent:(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*)\}\}")
            .expect("valid entity token regex")
    })
}

fn double_escaped_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&amp;(#[xX][0-9a-fA-F]+|#[0-9]+);").expect("valid collapse regex"))
}

fn preserve_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"lng-preserve:([A-Za-z0-9+/=]+)").expect("valid preserve regex"))
}

fn preserved_tag_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        PRESERVED_TAGS
            .iter()
            .map(|tag| {
                Regex::new(&format!(
                    r"(?is)(<{tag}(?:\s[^>]*[^/>]|\s*)>)(.*?)(</{tag}\s*>)",
                    tag = tag
                ))
                .expect("valid preserved tag regex")
            })
            .collect()
    })
}

/// 在 DOM 处理之前保护实体与脚本内容
pub fn protect(html: &str) -> String {
    let mut protected = html.to_string();

    for re in preserved_tag_regexes() {
        if !re.is_match(&protected) {
            continue;
        }
        protected = re
            .replace_all(&protected, |caps: &Captures| {
                let body = &caps[2];
                if body.is_empty() {
                    return caps[0].to_string();
                }
                format!("{}{}{}{}", &caps[1], PRESERVE_TOKEN, STANDARD.encode(body), &caps[3])
            })
            .into_owned();
    }

    entity_regex()
        .replace_all(&protected, |caps: &Captures| format!("{{{{{}{}}}}}", ENTITY_TOKEN, &caps[1]))
        .into_owned()
}

/// `protect` 的逆操作，在 DOM 序列化之后调用
///
/// 没有任何哨兵记号时原样返回输入。
pub fn restore(html: &str) -> String {
    if !html.contains(ENTITY_TOKEN) && !html.contains(PRESERVE_TOKEN) {
        return html.to_string();
    }

    // 页面原有的 `&amp;` 都已是记号，这里的 `&amp;#..;` 只可能来自序列化
    let collapsed = double_escaped_regex().replace_all(html, "&${1};");
    let restored = entity_token_regex().replace_all(&collapsed, "&${1};");

    preserve_token_regex()
        .replace_all(&restored, |caps: &Captures| {
            match STANDARD
                .decode(&caps[1])
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                Some(body) => body,
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// 还原实体记号后解码，得到属性或文本的真实值
pub fn restore_and_decode(value: &str) -> String {
    decode(&restore(value))
}

/// 解码命名实体与数字实体，无法识别的实体保持原样
pub fn decode(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    entity_regex()
        .replace_all(text, |caps: &Captures| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(payload: &str) -> Option<String> {
    if let Some(numeric) = payload.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        let ch = match code {
            0 => char::REPLACEMENT_CHARACTER,
            _ => char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
        };
        return Some(ch.to_string());
    }

    let key = format!("{};", payload);
    let (first, second) = NAMED_ENTITIES.get(key.as_str()).copied()?;
    if first == 0 {
        return None;
    }

    let mut decoded = String::new();
    decoded.push(char::from_u32(first)?);
    if second != 0 {
        decoded.push(char::from_u32(second)?);
    }
    Some(decoded)
}
