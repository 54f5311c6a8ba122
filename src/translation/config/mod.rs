//! 引擎配置管理模块
//!
//! 提供规则、匹配器与翻译后端的配置，支持环境变量、配置文件和默认值

pub mod manager;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::matchers::{MatcherConfig, MatcherMode};
use crate::translation::reinject::attribute;
use crate::translation::pipeline::rules::KeyFilterRule;

// 重新导出主要类型
pub use manager::ConfigManager;

/// 配置常量
pub mod constants {
    /// 默认API设置
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";
    pub const DEFAULT_TARGET_LANG: &str = "en";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const MAX_TIMEOUT_SECS: u64 = 600;

    /// 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "linguise-fragments.toml",
        ".linguise-fragments.toml",
        "~/.config/linguise-fragments/config.toml",
    ];

    /// .env 文件搜索顺序
    pub const ENV_FILES: &[&str] = &[".env.local", ".env"];
}

/// 翻译后端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_url: String,
    pub target_lang: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 引擎配置
///
/// 规则按以下顺序拼接成一个规则集：`priority_rules`、
/// `enabled_integrations` 中列出的集成规则（按列出顺序）、内置基线、`rules`。
/// 先出现的规则先命中。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 追加在基线之后的调用方规则
    pub rules: Vec<KeyFilterRule>,
    /// 放在基线之前的规则
    pub priority_rules: Vec<KeyFilterRule>,
    /// 集成/主题名 → 规则
    pub integrations: BTreeMap<String, Vec<KeyFilterRule>>,
    pub enabled_integrations: Vec<String>,
    pub matchers: Vec<MatcherConfig>,
    pub backend: BackendConfig,
    /// 默认是否使用严格收集
    pub strict: bool,
}

impl EngineConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        for matcher in &self.matchers {
            matcher.validate()?;
        }

        let mut names: Vec<&str> = self.matchers.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(TranslationError::ConfigError(format!(
                "匹配器名称重复: {}",
                pair[0]
            )));
        }

        let mut markers: Vec<(String, &str)> = self
            .matchers
            .iter()
            .filter(|m| matches!(m.mode, MatcherMode::AttributeJson | MatcherMode::AttributeString))
            .map(|m| (attribute::marker_name(&m.name), m.name.as_str()))
            .collect();
        markers.sort_unstable();
        if let Some(pair) = markers.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(TranslationError::ConfigError(format!(
                "属性匹配器 `{}` 与 `{}` 的标记名相同: {}",
                pair[0].1, pair[1].1, pair[0].0
            )));
        }

        if self.backend.timeout_secs == 0 || self.backend.timeout_secs > constants::MAX_TIMEOUT_SECS {
            return Err(TranslationError::ConfigError(format!(
                "超时时间必须在1到{}秒之间",
                constants::MAX_TIMEOUT_SECS
            )));
        }

        if self.backend.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（使用类型安全环境变量系统）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{translation, EnvVar};

        if let Ok(target_lang) = translation::TargetLang::get() {
            self.backend.target_lang = target_lang;
        }

        if let Ok(api_url) = translation::ApiUrl::get() {
            self.backend.api_url = api_url;
            tracing::info!("环境变量覆盖 API URL: {}", self.backend.api_url);
        }

        if let Ok(timeout) = translation::Timeout::get() {
            self.backend.timeout_secs = timeout.as_secs();
        }

        // Strict 有默认值，只在显式设置时覆盖文件配置
        if std::env::var_os(translation::Strict::NAME).is_some() {
            match translation::Strict::get() {
                Ok(strict) => self.strict = strict,
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }
    }
}
