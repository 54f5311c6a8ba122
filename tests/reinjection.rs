//! 写回策略集成测试
//!
//! 在完整页面上验证脚本字面量、app_json、属性与 i18n 目录的写回

use linguise_fragments::translation::matchers::{MatcherConfig, MatcherMode};
use linguise_fragments::translation::reinject::i18n::hash_key;
use linguise_fragments::translation::{
    Fragment, FragmentEngine, FragmentFormat, FragmentGroup, FragmentMode, GroupKey, MatcherSet,
    MockTranslator, RuleSet,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{
    assert_collected, assert_not_collected, shop_engine, CarrierOnlyTranslator, SHOP_PAGE,
};

#[test]
fn test_collect_shop_page() {
    let engine = shop_engine();
    let collected = engine.collect_html(SHOP_PAGE, false);
    let groups = &collected.groups;

    let keys: Vec<String> = groups.iter().map(|(key, _)| key.to_string()).collect();
    assert_eq!(
        keys,
        vec![
            "wc_params/script",
            "app/app_json",
            "shop_i18n/i18n",
            "variations/0",
            "tooltip/1"
        ]
    );

    for value in [
        "View cart",
        "/cart",
        "Summer sale",
        "%d item",
        "%d items",
        "Soft cotton shirt",
        "Add to wishlist",
    ] {
        assert_collected(groups, value);
    }
    for value in ["a1b2c3", "b-7", "ab-1"] {
        assert_not_collected(groups, value);
    }

    let link = &groups.get(&GroupKey::new("wc_params", "script")).unwrap().fragments[1];
    assert_eq!(link.format, FragmentFormat::Link);

    let catalog = groups.get(&GroupKey::new("shop_i18n", "i18n")).unwrap();
    assert_eq!(catalog.mode, FragmentMode::I18n);
    assert!(catalog.fragments.iter().all(|f| f.path == hash_key("%d item")));

    assert!(collected.html.contains("data-linguise-attribute-variations-0="));
    assert!(collected.html.contains("data-linguise-attribute-tooltip-1="));
}

#[test]
fn test_translate_shop_page() {
    let engine = shop_engine();
    let translator = CarrierOnlyTranslator::new(&[
        ("View cart", r#"Voir "le" panier"#),
        ("Summer sale", "Soldes d'été"),
        ("Soft cotton shirt", "Chemise en coton"),
        ("Add to wishlist", "Ajouter aux favoris"),
        ("</span> items</div>", "</span> articles</div>"),
        ("</span> item</div>", "</span> article</div>"),
    ]);

    let output = engine.translate_html(SHOP_PAGE, "fr", &translator);
    assert_eq!(translator.calls(), 1, "Page and fragments go out in one call");

    assert!(
        output.contains(r#"var wc_params = {"i18n_view_cart":"Voir \"le\" panier","cart_url":"/cart","nonce":"a1b2c3"};"#),
        "Script literal is re-encoded as JSON: {}",
        output
    );
    assert!(output.contains(r#"{"banner":{"headline":"Soldes d'été","id":"b-7"}}"#));
    assert!(output.contains(r#""%d item":["%d article","%d articles"]"#));
    assert!(output.contains("Chemise en coton"));
    assert!(output.contains(r#"data-tooltip="Ajouter aux favoris""#));

    assert!(output.contains("Summer &amp; Sun"), "Entities survive the DOM round trip");
    assert!(output.contains("&hearts;"));
    assert!(!output.contains("linguise-fragment"), "Carrier is cut out of the page");
    assert!(!output.contains("data-linguise-attribute-"), "Markers are stripped");
}

#[test]
fn test_untranslated_page_keeps_values() {
    let engine = shop_engine();
    let output = engine.translate_html(SHOP_PAGE, "fr", &MockTranslator::identity());

    assert!(output.contains(r#"var wc_params = {"i18n_view_cart":"View cart","cart_url":"/cart","nonce":"a1b2c3"};"#));
    assert!(output.contains(r#"data-tooltip="Add to wishlist""#));
    assert!(!output.contains("data-linguise-attribute-"));
}

#[test]
fn test_encoded_script_literal() {
    let matchers = MatcherSet::new(&[
        MatcherConfig::new("cfg", r#"var cfg = "([^"]*)";"#, MatcherMode::Script).encoded(),
    ])
    .unwrap();
    let engine = FragmentEngine::new(RuleSet::baseline().unwrap(), matchers);
    let page = r#"<script>var cfg = "%7B%22title%22%3A%22Hello%20there%22%7D";</script>"#;

    let collected = engine.collect_html(page, false);
    let key = GroupKey::new("cfg", "script");
    let group = collected.groups.get(&key).unwrap();
    assert_eq!(
        group.fragments,
        vec![Fragment::new("title", "Hello there", FragmentFormat::Text)]
    );

    let translated = FragmentGroup::with_fragments(
        FragmentMode::Override,
        vec![Fragment::new("title", "Salut toi", FragmentFormat::Text)],
    );
    assert_eq!(
        engine.apply_override(page, &key, &translated),
        r#"<script>var cfg = "%7B%22title%22%3A%22Salut%20toi%22%7D";</script>"#
    );
}

#[test]
fn test_script_json_escapes_closing_tags() {
    let matchers = MatcherSet::new(&[MatcherConfig::new(
        "cfg",
        r"var cfg = (\{.*?\});",
        MatcherMode::Script,
    )])
    .unwrap();
    let engine = FragmentEngine::new(RuleSet::baseline().unwrap(), matchers);
    let page = r#"<script>var cfg = {"text":"Hello there"};</script>"#;

    let key = GroupKey::new("cfg", "script");
    let translated = FragmentGroup::with_fragments(
        FragmentMode::Override,
        vec![Fragment::new("text", "Bye</script>", FragmentFormat::Text)],
    );
    assert_eq!(
        engine.apply_override(page, &key, &translated),
        r#"<script>var cfg = {"text":"Bye<\/script>"};</script>"#
    );
}

#[test]
fn test_i18n_patches_only_present_forms() {
    let engine = shop_engine();
    let key = GroupKey::new("shop_i18n", "i18n");
    let group = FragmentGroup::with_fragments(
        FragmentMode::I18n,
        vec![Fragment::new(hash_key("%d item"), "%d Stück", FragmentFormat::Text).with_plural_index(1)],
    );

    let output = engine.apply_i18n(SHOP_PAGE, &key, &group);
    assert!(output.contains(r#""%d item":["%d item","%d Stück"]"#));
    assert!(output.contains(r#""":{"domain":"messages"}"#), "Catalog header is untouched");
}

#[test]
fn test_attribute_groups_patch_their_own_element() {
    let engine = shop_engine();
    let collected = engine.collect_html(SHOP_PAGE, false);

    let key = GroupKey::new("tooltip", "1");
    let mut group = collected.groups.get(&key).unwrap().clone();
    group.fragments[0].value = "Merken".to_string();

    let output = engine.apply_attribute(&collected.html, &key, &group);
    assert!(output.contains(r#"data-tooltip="Merken""#));
    assert!(!output.contains("data-linguise-attribute-tooltip-1"));
    assert!(
        output.contains("data-linguise-attribute-variations-0"),
        "Other markers stay until the page is finished"
    );
}
