//! 正则定位的脚本字面量写回（含按 id 定位的 app_json 子模式）

use serde_json::Value;

use crate::translation::matchers::StructuralMatcher;
use crate::translation::pipeline::collector::FragmentCollector;
use crate::translation::types::{Fragment, FragmentGroup, GroupKey};

use super::auto;

/// 从匹配器定位到的字面量中收集片段
///
/// 未匹配或字面量不是合法 JSON 时返回 `None`。
pub fn collect(text: &str, matcher: &StructuralMatcher, collector: &FragmentCollector) -> Option<Vec<Fragment>> {
    let literal = match matcher {
        StructuralMatcher::ScriptLiteral(script) => script.extract(text)?,
        StructuralMatcher::AppJson(app) => app.extract(text)?,
        _ => return None,
    };

    match serde_json::from_str::<Value>(&literal) {
        Ok(tree) => Some(collector.collect(&tree)),
        Err(e) => {
            tracing::debug!("匹配器 `{}` 的字面量不是JSON: {}", matcher.name(), e);
            None
        }
    }
}

/// 把一个 Override 组写回原文
///
/// 锚点（正则匹配、JSON 解码）缺失时原样返回 `text`。
pub fn apply(text: &str, matcher: &StructuralMatcher, key: &GroupKey, group: &FragmentGroup) -> String {
    let rewrite = |literal: &str| -> Option<String> {
        let original: Value = match serde_json::from_str(literal) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("组 [{}] 的字面量无法解码: {}", key, e);
                return None;
            }
        };
        let patched = auto::apply_group(&original, key, group);
        serde_json::to_string(&patched)
            .map_err(|e| tracing::warn!("组 [{}] 重新编码失败: {}", key, e))
            .ok()
    };

    let patched = match matcher {
        StructuralMatcher::ScriptLiteral(script) => script.patch(text, rewrite),
        StructuralMatcher::AppJson(app) => app.patch(text, rewrite),
        _ => {
            tracing::warn!("组 [{}] 的匹配器不是脚本类型", key);
            None
        }
    };

    patched.unwrap_or_else(|| {
        tracing::warn!("组 [{}] 没有找到写回位置，保留原文", key);
        text.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::matchers::{MatcherConfig, MatcherMode};
    use crate::translation::pipeline::filters::ValueClassifier;
    use crate::translation::pipeline::rules::RuleSet;
    use crate::translation::types::{FragmentFormat, FragmentMode};

    fn script_matcher() -> StructuralMatcher {
        StructuralMatcher::compile(
            &MatcherConfig::new("cfg", r"var cfg = (\{.*?\});", MatcherMode::Script)
                .with_replacement("var cfg = $$JSON_DATA$$;"),
        )
        .unwrap()
    }

    #[test]
    fn test_collect_and_apply() {
        let rules = RuleSet::baseline().unwrap();
        let classifier = ValueClassifier::new();
        let collector = FragmentCollector::new(&rules, &classifier, false);
        let matcher = script_matcher();
        let text = r#"<script>var cfg = {"i18n_add":"Add to cart","nonce":"a1 b2"};</script>"#;

        let fragments = collect(text, &matcher, &collector).unwrap();
        assert_eq!(fragments, vec![Fragment::new("i18n_add", "Add to cart", FragmentFormat::Text)]);

        let key = GroupKey::new("cfg", "script");
        let group = FragmentGroup::with_fragments(
            FragmentMode::Override,
            vec![Fragment::new("i18n_add", "Ajouter au panier", FragmentFormat::Text)],
        );
        assert_eq!(
            apply(text, &matcher, &key, &group),
            r#"<script>var cfg = {"i18n_add":"Ajouter au panier","nonce":"a1 b2"};</script>"#
        );
    }

    #[test]
    fn test_unmatched_anchor_keeps_original() {
        let matcher = script_matcher();
        let key = GroupKey::new("cfg", "script");
        let group = FragmentGroup::with_fragments(
            FragmentMode::Override,
            vec![Fragment::new("a", "b", FragmentFormat::Text)],
        );

        let text = "<script>var other = {};</script>";
        assert_eq!(apply(text, &matcher, &key, &group), text);

        let broken = "<script>var cfg = {not json};</script>";
        assert_eq!(apply(broken, &matcher, &key, &group), broken);
    }
}
