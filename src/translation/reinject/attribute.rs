//! DOM 属性写回
//!
//! 收集时给每个命中的元素加上合成标记属性
//! `data-linguise-attribute-<name>-<counter>`，值为 `<属性名>|json` 或
//! `<属性名>|string`。即使多个元素的标签和属性相同，写回时也能唯一地
//! 重新定位。所有 DOM 往返都经过实体保护。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::parsers::html::{
    entities, get_node_attr, get_node_attrs_with_prefix, get_node_name, html_to_dom,
    serialize_document, set_node_attr, walk_elements,
};
use crate::translation::matchers::MatcherSet;
use crate::translation::pipeline::collector::FragmentCollector;
use crate::translation::pipeline::filters::ValueClassifier;
use crate::translation::pipeline::rules::{KeyDecision, RuleSet};
use crate::translation::types::{Fragment, FragmentGroup, FragmentMode, GroupKey};

use super::auto;

/// 标记属性前缀
pub const MARKER_PREFIX: &str = "data-linguise-attribute-";

const JSON_KIND: &str = "json";
const STRING_KIND: &str = "string";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\s+data-linguise-attribute-[A-Za-z0-9_-]+\s*=\s*(?:"[^"]*"|'[^']*')"#)
            .expect("valid marker regex")
    })
}

/// 匹配器名在标记属性中的形式：不能出现在属性名里的字符替换为 `-`
pub fn marker_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// 标记属性名
pub fn marker_attr(name: &str, counter: &str) -> String {
    format!("{}{}-{}", MARKER_PREFIX, marker_name(name), counter)
}

/// 加标记后的页面与收集到的属性组
#[derive(Debug, Clone)]
pub struct MarkedPage {
    pub html: String,
    pub groups: Vec<(GroupKey, FragmentGroup)>,
}

/// 收集属性值中的片段并给元素加标记
///
/// 没有任何属性匹配器命中时返回 `None`，页面不做 DOM 往返。
pub fn collect(
    html: &str,
    matchers: &MatcherSet,
    rules: &RuleSet,
    classifier: &ValueClassifier,
    strict: bool,
) -> Option<MarkedPage> {
    let lowered = html.to_ascii_lowercase();
    let candidates: Vec<_> = matchers
        .attribute_matchers()
        .filter(|matcher| lowered.contains(matcher.attribute()))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let dom = match html_to_dom(entities::protect(html).as_bytes(), "utf-8") {
        Ok(dom) => dom,
        Err(e) => {
            tracing::warn!("属性收集时页面解析失败: {}", e);
            return None;
        }
    };

    let mut groups = Vec::new();
    let mut counter: usize = 0;

    walk_elements(&dom.document, &mut |node| {
        let Some(tag) = get_node_name(node).map(str::to_string) else {
            return;
        };

        for matcher in candidates.iter().filter(|matcher| matcher.applies_to(&tag)) {
            let Some(raw) = get_node_attr(node, matcher.attribute()) else {
                continue;
            };
            let value = entities::restore_and_decode(&raw);
            let collector = FragmentCollector::new(rules, classifier, strict || matcher.strict());

            let fragments: Vec<Fragment> = if matcher.is_json() {
                match serde_json::from_str::<Value>(&value) {
                    Ok(tree) => collector.collect(&tree),
                    Err(_) => continue,
                }
            } else {
                // 匹配器本身就是对该属性的显式选择，键规则不参与
                classifier
                    .resolve_format(&value, &KeyDecision::Unknown)
                    .filter(|_| !value.trim().is_empty())
                    .map(|format| Fragment::new(matcher.attribute(), value.as_str(), format))
                    .into_iter()
                    .collect()
            };
            if fragments.is_empty() {
                continue;
            }

            let param = counter.to_string();
            let kind = if matcher.is_json() { JSON_KIND } else { STRING_KIND };
            set_node_attr(
                node,
                &marker_attr(matcher.name(), &param),
                Some(format!("{}|{}", matcher.attribute(), kind)),
            );

            let mut group = FragmentGroup::with_fragments(FragmentMode::Attribute, fragments);
            group.attribute_tag = Some(tag.clone());
            groups.push((GroupKey::new(matcher.name(), param), group));
            counter += 1;
        }
    });

    if groups.is_empty() {
        return None;
    }

    match serialize_document(dom) {
        Ok(serialized) => {
            tracing::debug!("属性收集完成: {} 个元素", groups.len());
            Some(MarkedPage {
                html: entities::restore(&serialized),
                groups,
            })
        }
        Err(e) => {
            tracing::warn!("属性收集时页面序列化失败: {}", e);
            None
        }
    }
}

/// 计算写回后的属性值
fn rewrite_value(current: &str, kind: &str, key: &GroupKey, group: &FragmentGroup) -> Option<String> {
    match kind {
        JSON_KIND => {
            let original: Value = serde_json::from_str(current)
                .map_err(|e| tracing::warn!("组 [{}] 的属性值不是JSON: {}", key, e))
                .ok()?;
            serde_json::to_string(&auto::apply_group(&original, key, group)).ok()
        }
        _ => group.active_fragments().next().map(|fragment| fragment.value.clone()),
    }
}

/// 写回多个属性组，并移除已写回元素上的标记
///
/// 找不到标记的组保持原样；没有任何写回时原样返回页面。
pub fn apply_all(html: &str, groups: &[(&GroupKey, &FragmentGroup)]) -> String {
    if groups.is_empty() || !html.contains(MARKER_PREFIX) {
        if !groups.is_empty() {
            tracing::warn!("页面中没有属性标记，{} 个属性组未写回", groups.len());
        }
        return html.to_string();
    }

    let by_marker: HashMap<String, (&GroupKey, &FragmentGroup)> = groups
        .iter()
        .map(|(key, group)| (marker_attr(&key.name, &key.param), (*key, *group)))
        .collect();

    let dom = match html_to_dom(entities::protect(html).as_bytes(), "utf-8") {
        Ok(dom) => dom,
        Err(e) => {
            tracing::warn!("属性写回时页面解析失败: {}", e);
            return html.to_string();
        }
    };

    let mut patched: usize = 0;
    walk_elements(&dom.document, &mut |node| {
        for (marker, marker_value) in get_node_attrs_with_prefix(node, MARKER_PREFIX) {
            let Some((key, group)) = by_marker.get(&marker) else {
                continue;
            };
            let Some((attribute, kind)) = entities::restore_and_decode(&marker_value)
                .split_once('|')
                .map(|(attribute, kind)| (attribute.to_string(), kind.to_string()))
            else {
                continue;
            };

            let current = get_node_attr(node, &attribute)
                .map(|raw| entities::restore_and_decode(&raw))
                .unwrap_or_default();
            match rewrite_value(&current, &kind, key, group) {
                Some(new_value) => {
                    set_node_attr(node, &attribute, Some(new_value));
                    patched += 1;
                }
                None => tracing::warn!("组 [{}] 没有可写回的值", key),
            }
            set_node_attr(node, &marker, None);
        }
    });

    if patched == 0 {
        tracing::warn!("没有找到任何属性组的标记元素");
        return html.to_string();
    }
    if patched < groups.len() {
        tracing::warn!("{} 个属性组中只写回了 {} 个", groups.len(), patched);
    }

    match serialize_document(dom) {
        Ok(serialized) => entities::restore(&serialized),
        Err(e) => {
            tracing::warn!("属性写回时页面序列化失败: {}", e);
            html.to_string()
        }
    }
}

/// 写回单个属性组
pub fn apply(html: &str, key: &GroupKey, group: &FragmentGroup) -> String {
    apply_all(html, &[(key, group)])
}

/// 移除页面中残留的所有标记属性
pub fn strip_markers(html: &str) -> String {
    if !html.contains(MARKER_PREFIX) {
        return html.to_string();
    }
    marker_regex().replace_all(html, "").into_owned()
}
