//! # Linguise Fragments
//!
//! 从 HTML 页面、内嵌脚本字面量、元素属性和 JSON 载荷中提取可翻译片段，
//! 通过一个合成的 HTML 载体文档交给翻译后端，再把译文写回原处。
//!
//! ## 模块组织
//!
//! - `core` - 顶层错误与内容类型
//! - `env` - 类型安全的环境变量
//! - `parsers` - HTML DOM 解析、序列化与实体保护
//! - `translation` - 片段收集、载体编解码与写回引擎

pub mod core;
pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use crate::core::{ContentKind, FragmentError};
pub use translation::{
    ConfigManager, EngineConfig, Fragment, FragmentEngine, FragmentFormat, FragmentGroup,
    FragmentGroups, FragmentMode, GroupKey, MatcherSet, MockTranslator, RuleSet,
    TranslationError, TranslationResult, Translator,
};
