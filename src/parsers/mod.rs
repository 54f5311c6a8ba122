//! # 解析器模块
//!
//! HTML 文档的 DOM 解析、序列化以及往返保护。
//! 引擎只在属性写回时才对页面做完整的 DOM 解析，其余位置按文本处理。

pub mod html;

pub use html::{entities, html_to_dom, serialize_document};
