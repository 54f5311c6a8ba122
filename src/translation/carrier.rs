//! 载体文档编解码
//!
//! 把片段组序列化为一份中性的 HTML 文档，使只理解 HTML 的翻译后端
//! 能像处理普通页面一样处理任意结构化文本；再从返回的文档中扫描
//! 合成标记标签，重建同样形状的片段组。
//!
//! 每个片段对应一个带 `class="linguise-fragment"` 的标签：
//!
//! | 格式            | 标签                         | 值的位置      |
//! |-----------------|------------------------------|---------------|
//! | `text` `html`   | `div`                        | 元素内容      |
//! | `html-main`     | `linguise-main`              | 元素内容      |
//! | `link`          | `a`                          | `href`        |
//! | `media-img`     | `img`                        | `src`         |
//! | `media-imgset`  | `img`                        | `srcset`      |
//!
//! 标记内容里同名标签不配对时（例如 `Sale</div><div>Now`），内容按文本转义，
//! 并带上 `data-fragment-escaped`，解析时再解码回原样。

use std::collections::HashMap;
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use quick_xml::escape::{escape, partial_escape};
use regex::{Captures, Regex};

use crate::parsers::html::entities;
use crate::translation::types::{
    Fragment, FragmentFormat, FragmentGroup, FragmentGroups, FragmentMode, GroupKey,
};

/// 片段标签的 class
pub const FRAGMENT_CLASS: &str = "linguise-fragment";

const SKIP_SUFFIX: &str = "-skip";
const ESCAPED_ATTR: &str = "data-fragment-escaped";
const SPRINTF_OPEN: &str = r#"<span class="linguise-sprintf" translate="no">"#;
const SPRINTF_CLOSE: &str = "</span>";

fn sprintf_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%(?:\d+\$)?[-+0#']*\d*(?:\.\d+)?[bcdeEfFgGosuxX]").expect("valid sprintf regex")
    })
}

fn sprintf_span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<span\b[^>]*\bclass\s*=\s*["']linguise-sprintf["'][^>]*>(.*?)</span\s*>"#)
            .expect("valid sprintf span regex")
    })
}

fn editor_span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<span\b[^>]*\bclass\s*=\s*["'][^"']*\blinguise-editor\b[^"']*["'][^>]*>(.*?)</span\s*>"#)
            .expect("valid editor span regex")
    })
}

fn document_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(/?)(html|head|body)\b").expect("valid document tag regex"))
}

fn substituted_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(/?)linguise-(html|head|body)\b").expect("valid substituted tag regex")
    })
}

fn open_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(div|a|img|linguise-main)\b([^>]*)>").expect("valid open tag regex")
    })
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("valid attribute regex")
    })
}

/// 同名标签的开闭匹配，用于计算嵌套深度
fn nesting_regex(tag: &str) -> Option<&'static Regex> {
    static RES: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    let res = RES.get_or_init(|| {
        ["div", "a", "linguise-main"]
            .into_iter()
            .map(|name| {
                let re = Regex::new(&format!(r"(?i)<(/?){}\b[^>]*?(/?)>", regex::escape(name)))
                    .expect("valid nesting regex");
                (name, re)
            })
            .collect()
    });
    res.get(tag)
}

/// 内容中 `tag` 的开闭标签是否配对
fn is_balanced(content: &str, tag: &str) -> bool {
    let Some(re) = nesting_regex(tag) else {
        return true;
    };
    let mut depth: usize = 0;
    for caps in re.captures_iter(content) {
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            }
        } else if !self_closing {
            depth += 1;
        }
    }
    depth == 0
}

/// 标记内容放进容器标签；不配对时转义原值并加上标志属性
fn markup_element(tag: &str, attrs: &str, content: &str, raw: &str) -> String {
    if is_balanced(content, tag) {
        format!("<{tag} {}>{}</{tag}>", attrs, protect_sprintf(content), tag = tag)
    } else {
        format!(
            r#"<{tag} {} {}="true">{}</{tag}>"#,
            attrs,
            ESCAPED_ATTR,
            protect_sprintf(&partial_escape(raw)),
            tag = tag
        )
    }
}

/// 把 sprintf 占位符包进不翻译的 span
pub fn protect_sprintf(content: &str) -> String {
    sprintf_regex()
        .replace_all(content, |caps: &Captures| {
            format!("{}{}{}", SPRINTF_OPEN, &caps[0], SPRINTF_CLOSE)
        })
        .into_owned()
}

/// `protect_sprintf` 的逆操作
pub fn unprotect_sprintf(content: &str) -> String {
    sprintf_span_regex().replace_all(content, "${1}").into_owned()
}

/// 序列化一个片段组
pub fn to_carrier(key: &GroupKey, group: &FragmentGroup) -> String {
    let mut carrier = String::new();
    for fragment in &group.fragments {
        carrier.push_str(&fragment_tag(key, group, fragment));
        carrier.push('\n');
    }
    carrier
}

/// 序列化全部片段组为完整的载体文档
pub fn to_carrier_document(groups: &FragmentGroups) -> String {
    let mut body = String::new();
    for (key, group) in groups.iter() {
        body.push_str(&to_carrier(key, group));
    }
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head><body>\n{}</body></html>\n",
        body
    )
}

fn fragment_tag(key: &GroupKey, group: &FragmentGroup, fragment: &Fragment) -> String {
    let fragment_key = percent_decode_str(&fragment.path).decode_utf8_lossy();
    let format = if fragment.skip {
        format!("{}{}", fragment.format.as_str(), SKIP_SUFFIX)
    } else {
        fragment.format.as_str().to_string()
    };

    let mut attrs = format!(
        r#"class="{}" data-fragment-name="{}" data-fragment-param="{}" data-fragment-key="{}" data-fragment-format="{}" data-fragment-mode="{}""#,
        FRAGMENT_CLASS,
        escape(key.name.as_str()),
        escape(key.param.as_str()),
        escape(&*fragment_key),
        format,
        group.mode.as_str()
    );

    let extra_id = match group.mode {
        FragmentMode::Attribute => group.attribute_tag.clone(),
        FragmentMode::I18n => fragment.plural_index.map(|index| index.to_string()),
        _ => None,
    };
    if let Some(extra_id) = extra_id {
        attrs.push_str(&format!(r#" data-fragment-extra-id="{}""#, escape(extra_id.as_str())));
    }

    match fragment.format {
        FragmentFormat::Link => format!(r#"<a {} href="{}"></a>"#, attrs, escape(fragment.value.as_str())),
        FragmentFormat::MediaImage => format!(r#"<img {} src="{}">"#, attrs, escape(fragment.value.as_str())),
        FragmentFormat::MediaImageSet => {
            format!(r#"<img {} srcset="{}">"#, attrs, escape(fragment.value.as_str()))
        }
        FragmentFormat::HtmlMain => {
            let substituted = document_tag_regex().replace_all(&fragment.value, "<${1}linguise-${2}");
            markup_element("linguise-main", &attrs, &substituted, &fragment.value)
        }
        FragmentFormat::Html => markup_element("div", &attrs, &fragment.value, &fragment.value),
        FragmentFormat::Text => format!(
            "<div {}>{}</div>",
            attrs,
            protect_sprintf(&partial_escape(fragment.value.as_str()))
        ),
    }
}

/// 解析标签属性，值做实体解码
fn parse_attrs(raw: &str) -> HashMap<String, String> {
    attr_regex()
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (caps[1].to_ascii_lowercase(), entities::decode(value))
        })
        .collect()
}

/// 从 `from` 开始查找与已打开标签配对的闭合标签
///
/// 返回 (内容结束位置, 闭合标签结束位置)。
fn find_closing(html: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let re = nesting_regex(tag)?;
    let mut depth: usize = 1;

    for caps in re.captures_iter(&html[from..]) {
        let whole = caps.get(0)?;
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());

        if closing {
            depth -= 1;
            if depth == 0 {
                return Some((from + whole.start(), from + whole.end()));
            }
        } else if !self_closing {
            depth += 1;
        }
    }

    None
}

/// 还原元素内容：去掉编辑器包装、还原标签替换与 sprintf 保护，按格式解码
fn decode_content(content: &str, format: FragmentFormat, escaped: bool) -> String {
    let content = editor_span_regex().replace_all(content, "${1}");
    let content = match format {
        FragmentFormat::HtmlMain => substituted_tag_regex()
            .replace_all(&content, "<${1}${2}")
            .into_owned(),
        _ => content.into_owned(),
    };
    let content = unprotect_sprintf(&content);

    if format.is_markup() && !escaped {
        content
    } else {
        entities::decode(&content)
    }
}

/// 解析返回的载体文档，重建片段组
pub fn from_carrier(html: &str) -> FragmentGroups {
    let mut groups = FragmentGroups::new();
    let mut position = 0;

    while let Some(caps) = open_tag_regex().captures_at(html, position) {
        let Some(open) = caps.get(0) else { break };
        position = open.end();

        let attrs = parse_attrs(&caps[2]);
        let is_fragment = attrs
            .get("class")
            .is_some_and(|class| class.split_whitespace().any(|c| c == FRAGMENT_CLASS));
        if !is_fragment {
            continue;
        }

        let tag = caps[1].to_ascii_lowercase();
        let (raw_value, marker_end) = if tag == "img" {
            (None, open.end())
        } else {
            match find_closing(html, &tag, open.end()) {
                Some((content_end, close_end)) => {
                    (Some(&html[open.end()..content_end]), close_end)
                }
                None => {
                    tracing::warn!("载体标签 <{}> 没有闭合，已忽略", tag);
                    continue;
                }
            }
        };

        let marker = &html[open.start()..marker_end];
        match parse_fragment(&tag, &attrs, raw_value, marker) {
            Some((key, mode, attribute_tag, fragment)) => {
                let mut group = FragmentGroup::with_fragments(mode, vec![fragment]);
                group.attribute_tag = attribute_tag;
                groups.merge(key, group);
            }
            None => tracing::warn!("无法解析的载体片段: {}", marker),
        }

        position = marker_end;
    }

    tracing::debug!(
        "载体解析完成: {} 个组, {} 个片段",
        groups.len(),
        groups.fragment_count()
    );
    groups
}

type ParsedFragment = (GroupKey, FragmentMode, Option<String>, Fragment);

fn parse_fragment(
    tag: &str,
    attrs: &HashMap<String, String>,
    content: Option<&str>,
    marker: &str,
) -> Option<ParsedFragment> {
    let name = attrs.get("data-fragment-name")?;
    let param = attrs.get("data-fragment-param").cloned().unwrap_or_default();
    let path = attrs.get("data-fragment-key")?;
    let raw_format = attrs.get("data-fragment-format")?;
    let mode: FragmentMode = attrs
        .get("data-fragment-mode")
        .map(|mode| mode.parse::<FragmentMode>())
        .transpose()
        .ok()?
        .unwrap_or_default();

    let (format_name, skip) = match raw_format.strip_suffix(SKIP_SUFFIX) {
        Some(stripped) => (stripped, true),
        None => (raw_format.as_str(), false),
    };
    let format: FragmentFormat = format_name.parse().ok()?;

    let value = match (tag, format) {
        ("a", _) => attrs.get("href").cloned().unwrap_or_default(),
        ("img", FragmentFormat::MediaImageSet) => attrs.get("srcset").cloned().unwrap_or_default(),
        ("img", _) => attrs.get("src").cloned().unwrap_or_default(),
        _ => decode_content(
            content.unwrap_or_default(),
            format,
            attrs.contains_key(ESCAPED_ATTR),
        ),
    };

    let extra_id = attrs.get("data-fragment-extra-id");
    let attribute_tag = match mode {
        FragmentMode::Attribute => extra_id.cloned(),
        _ => None,
    };
    let plural_index = match mode {
        FragmentMode::I18n => extra_id.and_then(|index| index.parse::<usize>().ok()),
        _ => None,
    };

    let fragment = Fragment {
        path: path.clone(),
        value,
        format,
        skip,
        plural_index,
        carrier_marker: Some(marker.to_string()),
    };

    Some((GroupKey::new(name.clone(), param), mode, attribute_tag, fragment))
}

/// 从文档中剪掉所有片段标记
pub fn strip_markers(html: &str, groups: &FragmentGroups) -> String {
    let mut stripped = html.to_string();
    for (_, group) in groups.iter() {
        for fragment in &group.fragments {
            if let Some(marker) = &fragment.carrier_marker {
                stripped = stripped.replacen(marker.as_str(), "", 1);
            }
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_groups() -> FragmentGroups {
        let mut groups = FragmentGroups::new();
        groups.merge(
            GroupKey::new("json", ""),
            FragmentGroup::with_fragments(
                FragmentMode::Auto,
                vec![
                    Fragment::new("title", "Tom & Jerry <3 %s items", FragmentFormat::Text),
                    Fragment::new("links[0]", "https://example.com/?a=1&b=\"2\"", FragmentFormat::Link),
                    Fragment::new("['hero-img']", "/img/hero.png", FragmentFormat::MediaImage),
                    Fragment::new("set", "/a.png 1x, /b.png 2x", FragmentFormat::MediaImageSet),
                    Fragment::new("body", "<div><div>Nested</div> 50% off</div>", FragmentFormat::Html),
                    Fragment::new("page", "<html><body><p>Hi</p></body></html>", FragmentFormat::HtmlMain),
                    Fragment::new("decoy", "Ignore me", FragmentFormat::Text).skipped(),
                ],
            ),
        );

        let mut attribute = FragmentGroup::with_fragments(
            FragmentMode::Attribute,
            vec![Fragment::new("label", "Add to cart", FragmentFormat::Text)],
        );
        attribute.attribute_tag = Some("button".to_string());
        groups.merge(GroupKey::new("variations", "0"), attribute);

        groups.merge(
            GroupKey::new("wp-i18n", "i18n"),
            FragmentGroup::with_fragments(
                FragmentMode::I18n,
                vec![
                    Fragment::new("abc", "One item", FragmentFormat::Text).with_plural_index(0),
                    Fragment::new("abc", "%d items", FragmentFormat::Text).with_plural_index(1),
                ],
            ),
        );
        groups
    }

    #[test]
    fn test_round_trip_identity() {
        let groups = sample_groups();
        let document = to_carrier_document(&groups);
        let parsed = from_carrier(&document);

        assert!(parsed.same_content(&groups), "parsed: {:?}", parsed);
        for (_, group) in parsed.iter() {
            for fragment in &group.fragments {
                let marker = fragment.carrier_marker.as_deref().unwrap();
                assert!(document.contains(marker));
            }
        }
    }

    #[test]
    fn test_unbalanced_markup_round_trip() {
        let mut groups = FragmentGroups::new();
        groups.push(
            GroupKey::new("json", ""),
            FragmentMode::Auto,
            Fragment::new("promo", r#"Sale</div><div class="x">Now"#, FragmentFormat::Html),
        );
        groups.push(
            GroupKey::new("json", ""),
            FragmentMode::Auto,
            Fragment::new(
                "page",
                "<html><body><p>Open</linguise-main> &amp; shut</p></body></html>",
                FragmentFormat::HtmlMain,
            ),
        );
        groups.push(
            GroupKey::new("json", ""),
            FragmentMode::Auto,
            Fragment::new("tail", "Still here", FragmentFormat::Text),
        );

        let document = to_carrier_document(&groups);
        assert!(document.contains(r#"data-fragment-escaped="true">Sale&lt;/div&gt;"#));

        let parsed = from_carrier(&document);
        assert!(parsed.same_content(&groups), "parsed: {:?}", parsed);
        assert_eq!(
            strip_markers(&document, &parsed),
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head><body>\n\n\n\n</body></html>\n",
            "Nothing of the fragments is left behind"
        );
    }

    #[test]
    fn test_balanced_markup_stays_raw() {
        assert!(is_balanced("<div><div>Nested</div></div>", "div"));
        assert!(!is_balanced("Sale</div><div>Now", "div"));
        assert!(!is_balanced("<div>open", "div"));
    }

    #[test]
    fn test_text_fragment_shape() {
        let mut groups = FragmentGroups::new();
        groups.push(
            GroupKey::new("json", ""),
            FragmentMode::Auto,
            Fragment::new("title", "Welcome back", FragmentFormat::Text),
        );

        let document = to_carrier_document(&groups);
        assert_eq!(document.matches(r#"<div class="linguise-fragment""#).count(), 1);
        assert!(document.contains(r#"data-fragment-format="text" data-fragment-mode="auto">Welcome back</div>"#));
    }

    #[test]
    fn test_sprintf_is_wrapped_and_restored() {
        let protected = protect_sprintf("Showing %1$s of %d, 50% off");
        assert!(protected.contains(r#"<span class="linguise-sprintf" translate="no">%1$s</span>"#));
        assert!(protected.contains(r#"<span class="linguise-sprintf" translate="no">%d</span>"#));
        assert!(protected.contains("50% off"));
        assert_eq!(unprotect_sprintf(&protected), "Showing %1$s of %d, 50% off");
    }

    #[test]
    fn test_translated_carrier_is_decoded() {
        let carrier = r#"<html><body><div class="linguise-fragment" data-fragment-name="json" data-fragment-param="" data-fragment-key="title" data-fragment-format="text" data-fragment-mode="auto"><span class="linguise-editor">Caf&eacute; &amp; th&eacute;</span></div></body></html>"#;
        let groups = from_carrier(carrier);
        let group = groups.get(&GroupKey::new("json", "")).unwrap();

        assert_eq!(group.fragments[0].value, "Café & thé");
    }

    #[test]
    fn test_unrelated_markup_ignored_and_markers_stripped() {
        let mut groups = FragmentGroups::new();
        groups.push(
            GroupKey::new("cfg", "script"),
            FragmentMode::Override,
            Fragment::new("a", "Hello there", FragmentFormat::Text),
        );
        let page = format!(
            "<body><div class=\"page\"><a href=\"/x\">x</a></div>{}</body>",
            to_carrier(&GroupKey::new("cfg", "script"), groups.get(&GroupKey::new("cfg", "script")).unwrap())
        );

        let parsed = from_carrier(&page);
        assert_eq!(parsed.fragment_count(), 1);
        assert_eq!(
            strip_markers(&page, &parsed),
            "<body><div class=\"page\"><a href=\"/x\">x</a></div>\n</body>"
        );
    }
}
