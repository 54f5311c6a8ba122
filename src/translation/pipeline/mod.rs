//! 片段提取管道
//!
//! 提供值分类、键过滤规则、JSON 路径定位与片段收集

pub mod collector;
pub mod filters;
pub mod path;
pub mod rules;

// 重新导出主要类型
pub use collector::FragmentCollector;
pub use filters::ValueClassifier;
pub use rules::{KeyDecision, KeyFilterRule, RuleKind, RuleMode, RuleSet, RuleSetBuilder};
