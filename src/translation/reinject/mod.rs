//! 写回策略
//!
//! 每种策略接收翻译后的片段组和原文，返回写回后的结果。锚点缺失或
//! 内容畸形时原样返回原文，单个片段的失败只记录日志。

pub mod attribute;
pub mod auto;
pub mod i18n;
pub mod overrides;
