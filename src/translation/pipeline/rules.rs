//! 键过滤规则引擎
//!
//! 规则按列表顺序求值，第一条命中的规则决定结果；没有优先级以外的
//! 任何覆盖机制。组合规则集时，需要对某个字段做例外处理的规则必须放在
//! 会先命中它的规则之前（见 [`RuleSetBuilder`] 的拼接顺序）。

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::translation::config::EngineConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::FragmentFormat;

/// 规则匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    /// 键名完全相等
    #[default]
    Exact,
    /// 完整路径完全相等
    Path,
    /// 正则（不锚定）匹配键名
    Regex,
    /// 正则（不锚定）匹配完整路径
    RegexFull,
    /// 键名包含模式，等价于 `^.*?pattern.*?$`
    Wildcard,
}

/// 规则类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Allow,
    #[default]
    Deny,
}

/// 键过滤规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFilterRule {
    #[serde(alias = "key")]
    pub pattern: String,
    #[serde(default)]
    pub mode: RuleMode,
    #[serde(default)]
    pub kind: RuleKind,
    /// 命中时强制按该格式收集
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<FragmentFormat>,
}

impl KeyFilterRule {
    pub fn new(pattern: impl Into<String>, mode: RuleMode, kind: RuleKind) -> Self {
        Self {
            pattern: pattern.into(),
            mode,
            kind,
            cast: None,
        }
    }

    pub fn allow(pattern: impl Into<String>, mode: RuleMode) -> Self {
        Self::new(pattern, mode, RuleKind::Allow)
    }

    pub fn deny(pattern: impl Into<String>, mode: RuleMode) -> Self {
        Self::new(pattern, mode, RuleKind::Deny)
    }

    pub fn with_cast(mut self, format: FragmentFormat) -> Self {
        self.cast = Some(format);
        self
    }
}

/// 规则求值结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    Allow,
    Deny,
    /// 视为允许，并使用指定格式
    Cast(FragmentFormat),
    /// 没有规则命中，交给值分类器
    Unknown,
}

impl KeyDecision {
    /// 规则是否显式放行
    pub fn is_explicit_allow(&self) -> bool {
        matches!(self, KeyDecision::Allow | KeyDecision::Cast(_))
    }
}

#[derive(Debug)]
enum RuleMatcher {
    Exact(String),
    Path(String),
    Regex(Regex),
    RegexFull(Regex),
    Wildcard(Regex),
}

impl RuleMatcher {
    fn compile(rule: &KeyFilterRule) -> TranslationResult<Self> {
        let compile_regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                TranslationError::from(e).with_context(format!("规则 `{}`", rule.pattern))
            })
        };

        Ok(match rule.mode {
            RuleMode::Exact => RuleMatcher::Exact(rule.pattern.clone()),
            RuleMode::Path => RuleMatcher::Path(rule.pattern.clone()),
            RuleMode::Regex => RuleMatcher::Regex(compile_regex(&rule.pattern)?),
            RuleMode::RegexFull => RuleMatcher::RegexFull(compile_regex(&rule.pattern)?),
            RuleMode::Wildcard => {
                RuleMatcher::Wildcard(compile_regex(&format!("^.*?{}.*?$", rule.pattern))?)
            }
        })
    }

    fn matches(&self, key: &str, path: &str) -> bool {
        match self {
            RuleMatcher::Exact(pattern) => key == pattern,
            RuleMatcher::Path(pattern) => path == pattern,
            RuleMatcher::Regex(re) | RuleMatcher::Wildcard(re) => re.is_match(key),
            RuleMatcher::RegexFull(re) => re.is_match(path),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    rule: KeyFilterRule,
    matcher: RuleMatcher,
}

/// 编译后的不可变规则集
///
/// 在程序启动时构建一次，按引用传给引擎的各个入口。
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// 从有序规则列表编译
    pub fn new(rules: Vec<KeyFilterRule>) -> TranslationResult<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let matcher = RuleMatcher::compile(&rule)?;
                Ok(CompiledRule { rule, matcher })
            })
            .collect::<TranslationResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// 不含任何规则，所有字段都交给值分类器
    pub fn empty() -> Self {
        Self::default()
    }

    /// 仅包含内置基线规则
    pub fn baseline() -> TranslationResult<Self> {
        Self::builder().baseline().build()
    }

    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    /// 按配置拼接：优先规则、启用的集成规则、基线、调用方规则
    pub fn from_config(config: &EngineConfig) -> TranslationResult<Self> {
        let mut builder = Self::builder().extend(config.priority_rules.clone());

        for name in &config.enabled_integrations {
            match config.integrations.get(name) {
                Some(rules) => builder = builder.extend(rules.clone()),
                None => {
                    return Err(TranslationError::ConfigError(format!(
                        "启用的集成 `{}` 没有定义规则",
                        name
                    )))
                }
            }
        }

        let rule_set = builder.baseline().extend(config.rules.clone()).build()?;
        tracing::debug!("规则集已编译: {} 条规则", rule_set.len());
        Ok(rule_set)
    }

    /// 求值：第一条命中的规则决定结果
    pub fn resolve(&self, key: &str, path: &str) -> KeyDecision {
        for compiled in &self.rules {
            if compiled.matcher.matches(key, path) {
                return match (compiled.rule.cast, compiled.rule.kind) {
                    (Some(format), _) => KeyDecision::Cast(format),
                    (None, RuleKind::Allow) => KeyDecision::Allow,
                    (None, RuleKind::Deny) => KeyDecision::Deny,
                };
            }
        }
        KeyDecision::Unknown
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &KeyFilterRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleSet({} rules)", self.rules.len())
    }
}

/// 规则集构建器，按调用顺序拼接
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<KeyFilterRule>,
}

impl RuleSetBuilder {
    /// 追加一组规则
    pub fn extend(mut self, rules: impl IntoIterator<Item = KeyFilterRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn rule(mut self, rule: KeyFilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// 追加内置基线规则
    pub fn baseline(self) -> Self {
        self.extend(baseline_rules())
    }

    pub fn build(self) -> TranslationResult<RuleSet> {
        RuleSet::new(self.rules)
    }
}

/// 内置基线：拒绝常见的机器字段，放行常见的文案字段
pub fn baseline_rules() -> Vec<KeyFilterRule> {
    const DENY_EXACT: &[&str] = &[
        "id",
        "uuid",
        "nonce",
        "hash",
        "token",
        "key",
        "slug",
        "class",
        "className",
        "style",
        "css",
        "currency",
        "currency_code",
        "locale",
        "lang",
        "type",
        "status",
    ];
    const DENY_REGEX: &[&str] = &["_id$", "_nonce$", "_key$", "_token$", "_class$", "^data-"];
    const ALLOW_EXACT: &[&str] = &[
        "title",
        "label",
        "description",
        "placeholder",
        "text",
        "message",
        "content",
        "alt",
    ];

    DENY_EXACT
        .iter()
        .map(|key| KeyFilterRule::deny(*key, RuleMode::Exact))
        .chain(
            DENY_REGEX
                .iter()
                .map(|pattern| KeyFilterRule::deny(*pattern, RuleMode::Regex)),
        )
        .chain(
            ALLOW_EXACT
                .iter()
                .map(|key| KeyFilterRule::allow(*key, RuleMode::Exact)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new(vec![
            KeyFilterRule::deny("x", RuleMode::Exact),
            KeyFilterRule::allow("x.*", RuleMode::Regex),
        ])
        .unwrap();

        assert_eq!(rules.resolve("x", "x"), KeyDecision::Deny);
        assert_eq!(rules.resolve("xy", "xy"), KeyDecision::Allow);
        assert_eq!(rules.resolve("other", "other"), KeyDecision::Unknown);
    }

    #[test]
    fn test_all_modes() {
        let rules = RuleSet::new(vec![
            KeyFilterRule::allow("a.b[0]", RuleMode::Path),
            KeyFilterRule::deny(r"^settings\.", RuleMode::RegexFull),
            KeyFilterRule::deny("url", RuleMode::Wildcard),
            KeyFilterRule::allow("name", RuleMode::Exact).with_cast(FragmentFormat::Html),
        ])
        .unwrap();

        assert_eq!(rules.resolve("b", "a.b[0]"), KeyDecision::Allow);
        assert_eq!(rules.resolve("b", "a.b[1]"), KeyDecision::Unknown);
        assert_eq!(rules.resolve("title", "settings.title"), KeyDecision::Deny);
        assert_eq!(rules.resolve("ajax_url_base", "ajax_url_base"), KeyDecision::Deny);
        assert_eq!(
            rules.resolve("name", "product.name"),
            KeyDecision::Cast(FragmentFormat::Html)
        );
    }

    #[test]
    fn test_invalid_regex_is_pattern_error() {
        let result = RuleSet::new(vec![KeyFilterRule::deny("(", RuleMode::Regex)]);
        assert!(matches!(result, Err(TranslationError::PatternError(_))));
    }

    #[test]
    fn test_builder_order_controls_precedence() {
        let rules = RuleSet::builder()
            .rule(KeyFilterRule::allow("slug", RuleMode::Exact))
            .baseline()
            .build()
            .unwrap();

        assert_eq!(rules.resolve("slug", "slug"), KeyDecision::Allow);
        assert_eq!(rules.resolve("nonce", "nonce"), KeyDecision::Deny);
        assert_eq!(rules.resolve("product_id", "product_id"), KeyDecision::Deny);
        assert_eq!(rules.resolve("title", "title"), KeyDecision::Allow);
    }

    #[test]
    fn test_rule_deserialization() {
        let rule: KeyFilterRule =
            serde_json::from_str(r#"{"key":"price_html","mode":"regex_full","kind":"allow","cast":"html"}"#)
                .unwrap();

        assert_eq!(rule.pattern, "price_html");
        assert_eq!(rule.mode, RuleMode::RegexFull);
        assert_eq!(rule.kind, RuleKind::Allow);
        assert_eq!(rule.cast, Some(FragmentFormat::Html));
    }
}
