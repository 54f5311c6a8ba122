// 集成测试公共模块
//
// 提供测试页面、引擎构建器和断言辅助

use std::cell::Cell;

use linguise_fragments::translation::matchers::{MatcherConfig, MatcherMode};
use linguise_fragments::translation::{
    EngineConfig, FragmentEngine, FragmentGroups, GroupKey, KeyFilterRule, MatcherSet, RuleMode,
    RuleSet, TranslationResult, Translator,
};

/// 商品页：脚本字面量、app_json 块、属性 JSON、属性字符串和 i18n 目录各一处
pub const SHOP_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Shop</title>
<script>var wc_params = {"i18n_view_cart":"View cart","cart_url":"/cart","nonce":"a1b2c3"};</script>
<script type="application/json" id="app-data">{"banner":{"headline":"Summer sale","id":"b-7"}}</script>
<script>var shop_i18n = {"locale_data":{"messages":{"":{"domain":"messages"},"%d item":["%d item","%d items"]}}};</script>
</head>
<body>
<h1>Summer &amp; Sun</h1>
<form class="variations_form" data-product_variations="[{&quot;variation_description&quot;:&quot;Soft cotton shirt&quot;,&quot;sku&quot;:&quot;ab-1&quot;}]"></form>
<button data-tooltip="Add to wishlist">&hearts;</button>
</body>
</html>
"#;

/// 页面对应的匹配器
pub fn shop_matchers() -> Vec<MatcherConfig> {
    vec![
        MatcherConfig::new("wc_params", r"var wc_params = (\{.*?\});", MatcherMode::Script)
            .with_replacement("var wc_params = $$JSON_DATA$$;"),
        MatcherConfig::new("app", "app-data", MatcherMode::AppJson),
        MatcherConfig::new("shop_i18n", r"var shop_i18n = (\{.*?\});</script>", MatcherMode::I18n),
        MatcherConfig::new("variations", "data-product_variations", MatcherMode::AttributeJson)
            .with_tag("form"),
        MatcherConfig::new("tooltip", "data-tooltip", MatcherMode::AttributeString),
    ]
}

/// 基线规则加上 `nonce` 拒绝规则
pub fn test_rules() -> RuleSet {
    RuleSet::builder()
        .rule(KeyFilterRule::deny("nonce", RuleMode::Exact))
        .baseline()
        .build()
        .expect("test rules compile")
}

/// 没有匹配器的引擎，用于 JSON 载荷
pub fn json_engine() -> FragmentEngine {
    FragmentEngine::new(test_rules(), MatcherSet::empty())
}

/// 带商品页匹配器的引擎
pub fn shop_engine() -> FragmentEngine {
    let matchers = MatcherSet::new(&shop_matchers()).expect("shop matchers compile");
    FragmentEngine::new(test_rules(), matchers)
}

/// 通过配置构建的引擎
pub fn configured_engine(config: &EngineConfig) -> FragmentEngine {
    FragmentEngine::from_config(config).expect("engine from config")
}

/// 收集到的所有 (组键, 路径, 值)
pub fn flatten(groups: &FragmentGroups) -> Vec<(GroupKey, String, String)> {
    groups
        .iter()
        .flat_map(|(key, group)| {
            group
                .fragments
                .iter()
                .map(move |fragment| (key.clone(), fragment.path.clone(), fragment.value.clone()))
        })
        .collect()
}

/// 断言某个值被收集到
pub fn assert_collected(groups: &FragmentGroups, value: &str) {
    assert!(
        flatten(groups).iter().any(|(_, _, v)| v == value),
        "Expected `{}` to be collected, got {:?}",
        value,
        flatten(groups)
    );
}

/// 断言某个值没有被收集
pub fn assert_not_collected(groups: &FragmentGroups, value: &str) {
    assert!(
        !flatten(groups).iter().any(|(_, _, v)| v == value),
        "Expected `{}` not to be collected",
        value
    );
}

/// 只翻译载体部分的后端：页面其余内容原样返回
///
/// 用来证明译文是经由写回策略而不是文本替换进入页面的。
pub struct CarrierOnlyTranslator {
    replacements: Vec<(String, String)>,
    calls: Cell<usize>,
}

impl CarrierOnlyTranslator {
    pub fn new(replacements: &[(&str, &str)]) -> Self {
        Self {
            replacements: replacements
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Translator for CarrierOnlyTranslator {
    fn translate(&self, content: &str, _language: &str) -> TranslationResult<String> {
        self.calls.set(self.calls.get() + 1);

        let start = content
            .find(r#"class="linguise-fragment""#)
            .and_then(|index| content[..index].rfind('<'))
            .unwrap_or(content.len());
        let (page, carrier) = content.split_at(start);

        let translated = self
            .replacements
            .iter()
            .fold(carrier.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to));
        Ok(format!("{}{}", page, translated))
    }
}
