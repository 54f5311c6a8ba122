//! 片段提取与写回模块
//!
//! 从页面内嵌的脚本、属性和 JSON 载荷中提取可翻译片段，经过 HTML 载体
//! 交给翻译后端，再把译文写回原处：
//! - **types**: 片段、片段组与格式
//! - **pipeline**: 值分类、键过滤规则、JSON 路径与收集
//! - **carrier**: 载体文档编解码
//! - **matchers**: 定位内嵌字面量的结构匹配器
//! - **reinject**: 四种写回策略
//! - **core**: 引擎编排与翻译后端
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust
//! use linguise_fragments::translation::{FragmentEngine, MatcherSet, MockTranslator, RuleSet};
//!
//! let engine = FragmentEngine::new(RuleSet::baseline().unwrap(), MatcherSet::empty());
//! let translator = MockTranslator::with_replacements([("Welcome back", "Bienvenue")]);
//!
//! let output = engine.translate_json(r#"{"title":"Welcome back"}"#, "fr", &translator);
//! assert_eq!(output, r#"{"title":"Bienvenue"}"#);
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 载体文档编解码
pub mod carrier;

/// 配置管理模块
///
/// 提供规则、匹配器与翻译后端的配置
pub mod config;

/// 引擎核心模块
pub mod core;

/// 错误处理模块
pub mod error;

/// 结构匹配器
pub mod matchers;

/// 片段提取管道
pub mod pipeline;

/// 写回策略
pub mod reinject;

/// 数据模型
pub mod types;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{CollectedPage, FragmentEngine, MockMode, MockTranslator, Translator};
#[cfg(feature = "http")]
pub use self::core::HttpTranslator;

pub use config::{constants, BackendConfig, ConfigManager, EngineConfig};

pub use error::{ErrorCategory, ErrorSeverity, PathError, TranslationError, TranslationResult};

pub use matchers::{MatcherConfig, MatcherMode, MatcherSet, StructuralMatcher};

pub use pipeline::{
    FragmentCollector, KeyDecision, KeyFilterRule, RuleKind, RuleMode, RuleSet, ValueClassifier,
};

pub use types::{Fragment, FragmentFormat, FragmentGroup, FragmentGroups, FragmentMode, GroupKey};

// ============================================================================
// 便利函数
// ============================================================================

/// 按默认配置加载并构建引擎
///
/// 配置来源见 [`ConfigManager::new`]。
pub fn engine_from_environment() -> TranslationResult<(FragmentEngine, EngineConfig)> {
    let config = ConfigManager::new()?.into_config();
    let engine = FragmentEngine::from_config(&config)?;
    Ok((engine, config))
}
