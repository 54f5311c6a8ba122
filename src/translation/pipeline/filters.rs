//! 值分类器
//!
//! 纯启发式函数：给定一个字符串，判断它是否可翻译，并赋予语义格式
//! （文本、链接、图片、图片集合、内嵌 HTML）。

use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use url::Url;

use crate::parsers::html::parser::parse_srcset;
use crate::parsers::html::utils::has_whitespace;
use crate::translation::pipeline::rules::KeyDecision;
use crate::translation::types::FragmentFormat;

/// 图片扩展名
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "tiff", "tif", "ico", "avif", "heic", "heif",
];

/// 值分类器
#[derive(Debug, Default)]
pub struct ValueClassifier {
    /// 缓存的正则表达式
    regex_cache: RegexCache,
}

/// 正则表达式缓存
#[derive(Debug, Default)]
struct RegexCache {
    email_regex: OnceLock<Regex>,
    uuid_regex: OnceLock<Regex>,
    placeholder_regex: OnceLock<Regex>,
    tag_regex: OnceLock<Regex>,
}

impl ValueClassifier {
    /// 创建新的值分类器
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断普通字符串是否可翻译
    ///
    /// 按固定顺序求值：JSON、空白、邮箱、UUID、标识符形态。
    /// 可翻译时返回 `Text`。
    pub fn classify(&self, value: &str) -> Option<FragmentFormat> {
        // 序列化数据伪装成文本
        if serde_json::from_str::<serde_json::Value>(value).is_ok() {
            return None;
        }

        if has_whitespace(value) {
            return Some(FragmentFormat::Text);
        }

        if self.is_email(value) || self.is_uuid(value) {
            return None;
        }

        // 看起来像标识符或 slug
        if self.looks_like_identifier(value) {
            return None;
        }

        Some(FragmentFormat::Text)
    }

    /// 首字母小写，或含有数字或符号
    fn looks_like_identifier(&self, value: &str) -> bool {
        let starts_lowercase = value.chars().next().is_some_and(|c| c.is_lowercase());
        starts_lowercase
            || value
                .chars()
                .any(|c| c.is_numeric() || !c.is_alphabetic())
    }

    /// 检查是否为邮箱
    pub fn is_email(&self, value: &str) -> bool {
        let email_regex = self.regex_cache.email_regex.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
        });
        email_regex.is_match(value)
    }

    /// 检查是否为 UUID（8-4-4-4-12）
    pub fn is_uuid(&self, value: &str) -> bool {
        let uuid_regex = self.regex_cache.uuid_regex.get_or_init(|| {
            Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
                .expect("valid uuid regex")
        });
        uuid_regex.is_match(value)
    }

    /// 检查是否为链接
    ///
    /// 绝对地址必须是结构合法的 http(s) URL；以 `/` 开头的相对地址
    /// 不能含空白，且只能有路径部分（或带有 `%%token%%` 占位符）。
    pub fn is_link(&self, value: &str) -> bool {
        let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Url::parse(value).is_ok_and(|url| url.host().is_some());
        }

        if !value.starts_with('/') || value.starts_with("//") || value.len() < 2 {
            return false;
        }
        if has_whitespace(value) {
            return false;
        }

        if self.has_placeholder(value) {
            return true;
        }

        match Url::parse("http://localhost").and_then(|base| base.join(value)) {
            Ok(url) => url.query().is_none() && url.fragment().is_none(),
            Err(_) => false,
        }
    }

    /// `%%token%%` 形式的占位符
    fn has_placeholder(&self, value: &str) -> bool {
        let placeholder_regex = self
            .regex_cache
            .placeholder_regex
            .get_or_init(|| Regex::new(r"%%[A-Za-z0-9_-]+%%").expect("valid placeholder regex"));
        placeholder_regex.is_match(value)
    }

    /// 检查是否为图片链接：必须先是链接，且路径以图片扩展名结尾
    pub fn is_image(&self, value: &str) -> bool {
        if !self.is_link(value) {
            return false;
        }

        let path = match Url::parse(value) {
            Ok(url) => url.path().to_string(),
            Err(_) => value
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        path.rsplit_once('.')
            .map(|(_, ext)| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// 检查是否为 `srcset` 形式的图片集合
    ///
    /// 至少两个候选项或带有描述符，且每个候选地址都是图片链接。
    pub fn is_image_set(&self, value: &str) -> bool {
        let items = parse_srcset(value);
        if items.is_empty() {
            return false;
        }
        if items.len() < 2 && items.iter().all(|item| item.descriptor.is_empty()) {
            return false;
        }
        items.iter().all(|item| self.is_image(item.path))
    }

    /// 检查是否为内嵌标记
    ///
    /// 能按 XML 解析且包含元素时为 `HtmlMain`；否则去掉标签后字符串
    /// 发生变化时为 `Html`。
    pub fn markup_format(&self, value: &str) -> Option<FragmentFormat> {
        if is_well_formed_markup(value) {
            return Some(FragmentFormat::HtmlMain);
        }

        let tag_regex = self
            .regex_cache
            .tag_regex
            .get_or_init(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("valid tag regex"));
        if tag_regex.is_match(value) {
            return Some(FragmentFormat::Html);
        }

        None
    }

    /// 为字段确定最终格式
    ///
    /// 优先级：规则 cast > 图片集合/图片/链接 > 标记 > 文本。
    /// 返回 `None` 表示不收集。
    pub fn resolve_format(&self, value: &str, decision: &KeyDecision) -> Option<FragmentFormat> {
        if let KeyDecision::Cast(format) = decision {
            return Some(*format);
        }

        let heuristic = if self.is_image_set(value) {
            Some(FragmentFormat::MediaImageSet)
        } else if self.is_image(value) {
            Some(FragmentFormat::MediaImage)
        } else if self.is_link(value) {
            Some(FragmentFormat::Link)
        } else if let Some(markup) = self.markup_format(value) {
            Some(markup)
        } else {
            self.classify(value)
        };

        match (heuristic, decision) {
            (Some(format), _) => Some(format),
            // 规则显式允许时，分类器拒绝的值也按文本收集
            (None, KeyDecision::Allow) => Some(FragmentFormat::Text),
            (None, _) => None,
        }
    }
}

/// 以 XML 方式检查内嵌标记是否结构完整，且至少包含一个元素
fn is_well_formed_markup(value: &str) -> bool {
    if !value.contains('<') {
        return false;
    }

    let wrapped = format!("<linguise-root>{}</linguise-root>", value);
    let mut reader = Reader::from_str(&wrapped);
    let mut depth: usize = 0;
    let mut elements: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                elements += 1;
            }
            Ok(Event::Empty(_)) => elements += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return false,
        }
    }

    // 包裹用的根元素不计入
    depth == 0 && elements > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_precedence() {
        let classifier = ValueClassifier::new();

        assert_eq!(classifier.classify("{\"a\":1}"), None, "JSON is not text");
        assert_eq!(classifier.classify("123"), None, "numbers parse as JSON");
        assert_eq!(classifier.classify("hello world"), Some(FragmentFormat::Text));
        assert_eq!(classifier.classify("someone@example.com"), None);
        assert_eq!(classifier.classify("123e4567-e89b-12d3-a456-426614174000"), None);
        assert_eq!(classifier.classify("slug"), None, "lowercase first char");
        assert_eq!(classifier.classify("Item2"), None, "contains digit");
        assert_eq!(classifier.classify("Save!"), None, "contains symbol");
        assert_eq!(classifier.classify("Save"), Some(FragmentFormat::Text));
    }

    #[test]
    fn test_link_detection() {
        let classifier = ValueClassifier::new();

        assert!(classifier.is_link("https://example.com/a/b"));
        assert!(classifier.is_link("/path/only"));
        assert!(classifier.is_link("/?wc-ajax=%%endpoint%%"));
        assert!(!classifier.is_link("/path?query=1"));
        assert!(!classifier.is_link("//cdn.example.com/x"));
        assert!(!classifier.is_link("not a url at all"));
        assert!(!classifier.is_link("https://"));
    }

    #[test]
    fn test_image_requires_link() {
        let classifier = ValueClassifier::new();

        assert!(classifier.is_image("https://example.com/a/photo.JPG"));
        assert!(classifier.is_image("/uploads/logo.svg"));
        assert!(!classifier.is_image("photo.jpg"), "not a link, so not an image");
        assert!(!classifier.is_image("https://example.com/page.html"));
    }

    #[test]
    fn test_image_set_detection() {
        let classifier = ValueClassifier::new();

        assert!(classifier.is_image_set("/a-480.jpg 480w, /a-800.jpg 800w"));
        assert!(!classifier.is_image_set("/a-480.jpg"));
        assert!(!classifier.is_image_set("/a.jpg 1x, /page.html 2x"));
    }

    #[test]
    fn test_markup_detection() {
        let classifier = ValueClassifier::new();

        assert_eq!(
            classifier.markup_format("<p>Hello <b>there</b></p>"),
            Some(FragmentFormat::HtmlMain)
        );
        assert_eq!(
            classifier.markup_format("Line one<br>Line two"),
            Some(FragmentFormat::Html)
        );
        assert_eq!(classifier.markup_format("a < b and c > d"), None);
        assert_eq!(classifier.markup_format("Plain text"), None);
    }

    #[test]
    fn test_resolve_format_priority() {
        let classifier = ValueClassifier::new();

        assert_eq!(
            classifier.resolve_format("https://example.com/x.png", &KeyDecision::Unknown),
            Some(FragmentFormat::MediaImage)
        );
        assert_eq!(
            classifier.resolve_format("<a href=\"/x\">Go</a>", &KeyDecision::Unknown),
            Some(FragmentFormat::HtmlMain)
        );
        assert_eq!(
            classifier.resolve_format("hello", &KeyDecision::Cast(FragmentFormat::Html)),
            Some(FragmentFormat::Html)
        );
        assert_eq!(classifier.resolve_format("slug", &KeyDecision::Unknown), None);
        assert_eq!(
            classifier.resolve_format("slug", &KeyDecision::Allow),
            Some(FragmentFormat::Text)
        );
    }
}
