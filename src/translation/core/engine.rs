//! 片段引擎
//!
//! 把分类、规则、收集、载体编解码和四种写回策略串成两条对外流程：
//! 收集后生成载体，以及解析返回的载体后写回原文。
//!
//! ## 工作流程
//! 1. 从 JSON 或页面中收集片段组
//! 2. 序列化为载体文档（页面流程中注入到 `</body>` 之前）
//! 3. 调用翻译后端
//! 4. 从返回文档中解析片段组并按组的模式写回
//!
//! 任何一步失败都回退为原文，不向调用方报错。

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::core::ContentKind;
use crate::translation::carrier;
use crate::translation::config::EngineConfig;
use crate::translation::error::{helpers, TranslationResult};
use crate::translation::matchers::{MatcherSet, StructuralMatcher};
use crate::translation::pipeline::collector::FragmentCollector;
use crate::translation::pipeline::filters::ValueClassifier;
use crate::translation::pipeline::rules::RuleSet;
use crate::translation::reinject::{attribute, auto, i18n, overrides};
use crate::translation::types::{Fragment, FragmentGroup, FragmentGroups, FragmentMode, GroupKey};

use super::backend::Translator;

/// 原始 JSON 载荷的组名
pub const JSON_GROUP_NAME: &str = "json";

/// 收集结果：可能加了属性标记的页面和片段组
#[derive(Debug, Clone, Default)]
pub struct CollectedPage {
    pub html: String,
    pub groups: FragmentGroups,
}

/// 引擎运行统计
#[derive(Debug, Default)]
pub struct EngineStats {
    pub fragments_collected: AtomicUsize,
    pub backend_calls: AtomicUsize,
    pub backend_failures: AtomicUsize,
    pub groups_applied: AtomicUsize,
}

/// 统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatsSnapshot {
    pub fragments_collected: usize,
    pub backend_calls: usize,
    pub backend_failures: usize,
    pub groups_applied: usize,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            fragments_collected: self.fragments_collected.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            groups_applied: self.groups_applied.load(Ordering::Relaxed),
        }
    }
}

/// 片段引擎
///
/// 规则集与匹配器集在构造时编译一次，之后只读。
#[derive(Debug)]
pub struct FragmentEngine {
    rules: RuleSet,
    matchers: MatcherSet,
    classifier: ValueClassifier,
    strict: bool,
    stats: EngineStats,
}

impl FragmentEngine {
    pub fn new(rules: RuleSet, matchers: MatcherSet) -> Self {
        Self {
            rules,
            matchers,
            classifier: ValueClassifier::new(),
            strict: false,
            stats: EngineStats::default(),
        }
    }

    /// 默认使用严格收集
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// 从配置编译规则集与匹配器集
    pub fn from_config(config: &EngineConfig) -> TranslationResult<Self> {
        let rules = RuleSet::from_config(config)?;
        let matchers = MatcherSet::from_config(config)?;
        tracing::info!("引擎就绪: {} 条规则, {} 个匹配器", rules.len(), matchers.len());
        Ok(Self::new(rules, matchers).with_strict(config.strict))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn matchers(&self) -> &MatcherSet {
        &self.matchers
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    fn collector(&self, strict: bool) -> FragmentCollector<'_> {
        FragmentCollector::new(&self.rules, &self.classifier, strict || self.strict)
    }

    fn record_collected(&self, groups: &FragmentGroups) {
        self.stats
            .fragments_collected
            .fetch_add(groups.fragment_count(), Ordering::Relaxed);
    }

    /// 从 JSON 树中收集片段，结果放在 `("json", "")` 组中
    pub fn collect_json(&self, tree: &Value, strict: bool) -> FragmentGroups {
        let mut groups = FragmentGroups::new();
        let fragments = self.collector(strict).collect(tree);
        if !fragments.is_empty() {
            groups.merge(
                GroupKey::new(JSON_GROUP_NAME, ""),
                FragmentGroup::with_fragments(FragmentMode::Auto, fragments),
            );
        }
        self.record_collected(&groups);
        groups
    }

    /// 从页面中收集片段
    ///
    /// 脚本字面量、app_json 块和 i18n 目录按匹配器顺序收集；属性匹配器
    /// 命中时返回的页面带有标记属性，后续写回必须基于这份页面。
    pub fn collect_html(&self, html: &str, strict: bool) -> CollectedPage {
        let mut groups = FragmentGroups::new();

        for matcher in self.matchers.iter() {
            let key = GroupKey::new(matcher.name(), matcher.group_param());
            match matcher {
                StructuralMatcher::ScriptLiteral(script) => {
                    let collector = self.collector(strict || script.strict());
                    if let Some(fragments) = overrides::collect(html, matcher, &collector) {
                        merge_non_empty(&mut groups, key, FragmentMode::Override, fragments);
                    }
                }
                StructuralMatcher::AppJson(app) => {
                    let collector = self.collector(strict || app.strict());
                    if let Some(fragments) = overrides::collect(html, matcher, &collector) {
                        merge_non_empty(&mut groups, key, FragmentMode::Override, fragments);
                    }
                }
                StructuralMatcher::I18n(catalog) => {
                    if let Some(fragments) = i18n::collect(html, catalog, &self.classifier) {
                        merge_non_empty(&mut groups, key, FragmentMode::I18n, fragments);
                    }
                }
                StructuralMatcher::Attribute(_) => {}
            }
        }

        let mut page = html.to_string();
        if let Some(marked) = attribute::collect(
            html,
            &self.matchers,
            &self.rules,
            &self.classifier,
            strict || self.strict,
        ) {
            page = marked.html;
            for (key, group) in marked.groups {
                groups.merge(key, group);
            }
        }

        tracing::debug!(
            "页面收集完成: {} 个组, {} 个片段",
            groups.len(),
            groups.fragment_count()
        );
        self.record_collected(&groups);
        CollectedPage { html: page, groups }
    }

    pub fn to_carrier(&self, key: &GroupKey, group: &FragmentGroup) -> String {
        carrier::to_carrier(key, group)
    }

    pub fn to_carrier_document(&self, groups: &FragmentGroups) -> String {
        carrier::to_carrier_document(groups)
    }

    pub fn from_carrier(&self, html: &str) -> FragmentGroups {
        carrier::from_carrier(html)
    }

    /// 把一个组写回 JSON 树的副本
    pub fn apply_auto(&self, original: &Value, key: &GroupKey, group: &FragmentGroup) -> Value {
        self.stats.groups_applied.fetch_add(1, Ordering::Relaxed);
        auto::apply_group(original, key, group)
    }

    /// 按组名找到脚本类匹配器并写回，找不到时原样返回
    pub fn apply_override(&self, text: &str, key: &GroupKey, group: &FragmentGroup) -> String {
        match self.matchers.get(&key.name) {
            Some(matcher @ (StructuralMatcher::ScriptLiteral(_) | StructuralMatcher::AppJson(_))) => {
                self.stats.groups_applied.fetch_add(1, Ordering::Relaxed);
                overrides::apply(text, matcher, key, group)
            }
            _ => {
                tracing::warn!("组 [{}] 没有对应的脚本匹配器", key);
                text.to_string()
            }
        }
    }

    /// 按组名找到目录匹配器并写回，找不到时原样返回
    pub fn apply_i18n(&self, html: &str, key: &GroupKey, group: &FragmentGroup) -> String {
        match self.matchers.get(&key.name) {
            Some(StructuralMatcher::I18n(catalog)) => {
                self.stats.groups_applied.fetch_add(1, Ordering::Relaxed);
                i18n::apply(html, catalog, key, group)
            }
            _ => {
                tracing::warn!("组 [{}] 没有对应的目录匹配器", key);
                html.to_string()
            }
        }
    }

    /// 写回一个属性组，页面必须是 [`collect_html`](Self::collect_html) 返回的带标记版本
    pub fn apply_attribute(&self, html: &str, key: &GroupKey, group: &FragmentGroup) -> String {
        self.stats.groups_applied.fetch_add(1, Ordering::Relaxed);
        attribute::apply(html, key, group)
    }

    fn call_backend(&self, content: &str, language: &str, translator: &dyn Translator) -> Option<String> {
        self.stats.backend_calls.fetch_add(1, Ordering::Relaxed);
        let result = translator
            .translate(content, language)
            .or_else(|e| helpers::log_error(e.with_context("翻译后端失败，返回原文")));
        match result {
            Ok(translated) => Some(translated),
            Err(_) => {
                self.stats.backend_failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 翻译一个原始 JSON 载荷
    ///
    /// 解析失败、没有片段或后端失败时返回原文。
    pub fn translate_json(&self, json: &str, language: &str, translator: &dyn Translator) -> String {
        let tree: Value = match serde_json::from_str(json) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!("输入不是合法JSON，保留原文: {}", e);
                return json.to_string();
            }
        };

        let groups = self.collect_json(&tree, false);
        if groups.is_empty() {
            tracing::debug!("没有可翻译的片段");
            return json.to_string();
        }

        let document = carrier::to_carrier_document(&groups);
        let Some(translated) = self.call_backend(&document, language, translator) else {
            return json.to_string();
        };

        let patched = self.apply_json(&tree, &carrier::from_carrier(&translated));
        let rendered = if json.contains('\n') {
            serde_json::to_string_pretty(&patched)
        } else {
            serde_json::to_string(&patched)
        };
        rendered.unwrap_or_else(|e| {
            tracing::warn!("JSON重新编码失败，保留原文: {}", e);
            json.to_string()
        })
    }

    /// 翻译一个页面及其内嵌片段
    ///
    /// 片段载体注入到页面的 `</body>` 之前，和页面一起送到后端。返回后
    /// 先剪掉载体，再按组的模式写回脚本、目录和属性。后端失败时返回原文。
    pub fn translate_html(&self, html: &str, language: &str, translator: &dyn Translator) -> String {
        let collected = self.collect_html(html, false);

        let mut fragments = String::new();
        for (key, group) in collected.groups.iter() {
            fragments.push_str(&carrier::to_carrier(key, group));
        }
        let outgoing = inject_before_body_end(&collected.html, &fragments);

        let Some(translated) = self.call_backend(&outgoing, language, translator) else {
            return html.to_string();
        };

        let returned = carrier::from_carrier(&translated);
        let page = carrier::strip_markers(&translated, &returned);

        tracing::info!(
            "页面翻译完成: 收集 {} 个组, 返回 {} 个组",
            collected.groups.len(),
            returned.len()
        );
        self.apply_page(&page, &returned)
    }

    /// 把 JSON 载荷组写回树的副本，其他模式的组忽略
    pub fn apply_json(&self, tree: &Value, groups: &FragmentGroups) -> Value {
        let mut patched = tree.clone();
        for (key, group) in groups.iter() {
            if group.mode != FragmentMode::Auto {
                tracing::warn!("组 [{}] 的模式 {} 不适用于JSON载荷", key, group.mode);
                continue;
            }
            patched = self.apply_auto(&patched, key, group);
        }
        patched
    }

    /// 按组的模式把片段组写回页面，最后清掉所有属性标记
    pub fn apply_page(&self, html: &str, groups: &FragmentGroups) -> String {
        let mut page = html.to_string();
        let mut attribute_groups = Vec::new();

        for (key, group) in groups.iter() {
            match group.mode {
                FragmentMode::Override => page = self.apply_override(&page, key, group),
                FragmentMode::I18n => page = self.apply_i18n(&page, key, group),
                FragmentMode::Attribute => attribute_groups.push((key, group)),
                FragmentMode::Auto => tracing::warn!("页面中出现了JSON载荷组 [{}]，忽略", key),
                FragmentMode::Skip => {}
            }
        }

        if !attribute_groups.is_empty() {
            self.stats
                .groups_applied
                .fetch_add(attribute_groups.len(), Ordering::Relaxed);
            page = attribute::apply_all(&page, &attribute_groups);
        }

        attribute::strip_markers(&page)
    }

    /// 按内容类型分派到 JSON 或页面流程
    pub fn translate(&self, content: &str, language: &str, translator: &dyn Translator) -> String {
        match ContentKind::sniff(content) {
            ContentKind::Json => self.translate_json(content, language, translator),
            ContentKind::Html => self.translate_html(content, language, translator),
        }
    }
}

fn merge_non_empty(
    groups: &mut FragmentGroups,
    key: GroupKey,
    mode: FragmentMode,
    fragments: Vec<Fragment>,
) {
    if !fragments.is_empty() {
        groups.merge(key, FragmentGroup::with_fragments(mode, fragments));
    }
}

/// 在最后一个 `</body` 之前插入内容，没有时追加到末尾
fn inject_before_body_end(html: &str, insert: &str) -> String {
    if insert.is_empty() {
        return html.to_string();
    }
    match html.to_ascii_lowercase().rfind("</body") {
        Some(index) => format!("{}{}{}", &html[..index], insert, &html[index..]),
        None => format!("{}{}", html, insert),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::backend::MockTranslator;
    use crate::translation::matchers::{MatcherConfig, MatcherMode};
    use crate::translation::pipeline::rules::{KeyFilterRule, RuleMode};
    use crate::translation::types::FragmentFormat;
    use serde_json::json;

    fn engine() -> FragmentEngine {
        let rules = RuleSet::builder()
            .rule(KeyFilterRule::deny("nonce", RuleMode::Exact))
            .build()
            .unwrap();
        FragmentEngine::new(rules, MatcherSet::empty())
    }

    #[test]
    fn test_collect_json_group_key() {
        let groups = engine().collect_json(&json!({"title": "Welcome back", "count": 3}), false);
        let group = groups.get(&GroupKey::new("json", "")).unwrap();
        assert_eq!(group.mode, FragmentMode::Auto);
        assert_eq!(
            group.fragments,
            vec![Fragment::new("title", "Welcome back", FragmentFormat::Text)]
        );
    }

    #[test]
    fn test_translate_json_end_to_end() {
        let engine = engine();
        let translator = MockTranslator::with_replacements([("Welcome back", "Bienvenue")]);
        let output = engine.translate_json(
            r#"{"title":"Welcome back","count":3,"nonce":"abc123"}"#,
            "fr",
            &translator,
        );
        assert_eq!(output, r#"{"title":"Bienvenue","count":3,"nonce":"abc123"}"#);
        assert_eq!(engine.stats().snapshot().backend_calls, 1);
    }

    #[test]
    fn test_no_fragments_skips_backend() {
        let translator = MockTranslator::identity();
        let input = r#"{"count":3}"#;
        assert_eq!(engine().translate_json(input, "fr", &translator), input);
        assert_eq!(translator.calls(), 0);
    }

    #[test]
    fn test_backend_failure_returns_original() {
        let engine = engine();
        let translator = MockTranslator::failing();
        let input = r#"{"title":"Welcome back"}"#;
        assert_eq!(engine.translate_json(input, "fr", &translator), input);
        assert_eq!(engine.stats().snapshot().groups_applied, 0, "No patch after a failed call");
    }

    #[test]
    fn test_translate_html_script_literal() {
        let matchers = MatcherSet::new(&[MatcherConfig::new(
            "cfg",
            r"var cfg = (\{.*?\});",
            MatcherMode::Script,
        )])
        .unwrap();
        let engine = FragmentEngine::new(RuleSet::baseline().unwrap(), matchers);
        let html = r#"<html><body><p>Hi</p><script>var cfg = {"title":"Add to cart"};</script></body></html>"#;

        let translator = MockTranslator::with_replacements([("Add to cart", "Ajouter au panier")]);
        let output = engine.translate_html(html, "fr", &translator);

        assert!(output.contains(r#"var cfg = {"title":"Ajouter au panier"};"#));
        assert!(!output.contains("linguise-fragment"), "Carrier is removed from the page");
    }

    #[test]
    fn test_inject_before_body_end() {
        assert_eq!(inject_before_body_end("<BODY>x</BODY>", "<i/>"), "<BODY>x<i/></BODY>");
        assert_eq!(inject_before_body_end("plain", "<i/>"), "plain<i/>");
    }
}
