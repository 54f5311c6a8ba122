//! HTML解析和处理模块
//!
//! - `utils`: 基础常量
//! - `entities`: 实体与脚本内容在 DOM 往返中的保护
//! - `parser`: srcset 解析
//! - `dom`: 基础DOM操作
//! - `serializer`: 序列化功能

pub mod dom;
pub mod entities;
pub mod parser;
pub mod serializer;
pub mod utils;

pub use dom::{
    get_node_attr, get_node_attrs_with_prefix, get_node_name, html_to_dom, set_node_attr,
    walk_elements,
};
pub use parser::{parse_srcset, SrcSetItem};
pub use serializer::serialize_document;
pub use utils::WHITESPACES;
