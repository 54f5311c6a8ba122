//! `srcset` 属性解析
//!
//! 识别响应式图片的候选列表，供值分类器判断一个字段是否为图片集合。
//!
//! ```rust
//! use linguise_fragments::parsers::html::parser::parse_srcset;
//!
//! let srcset_items = parse_srcset("small.jpg 480w, large.jpg 800w");
//! assert_eq!(srcset_items.len(), 2);
//! assert_eq!(srcset_items[1].descriptor, "800w");
//! ```

use super::utils::WHITESPACES;

/// SrcSet 属性项目结构
///
/// ## 字段说明
///
/// - `path`: 图片文件的路径或URL
/// - `descriptor`: 宽度描述符（如 "480w"）或像素密度描述符（如 "2x"），缺省为空字符串
#[derive(Debug, PartialEq, Eq)]
pub struct SrcSetItem<'a> {
    pub path: &'a str,
    pub descriptor: &'a str,
}

/// 解析 `srcset` 属性
///
/// 候选项以逗号分隔，每项为路径加可选描述符。URL 内部的逗号
/// （例如 `a.jpg?x=1,2 2x`）不会被当作分隔符：只有跟在描述符或
/// 空白之后的逗号才结束一个候选项。
pub fn parse_srcset(srcset: &str) -> Vec<SrcSetItem> {
    let mut srcset_items: Vec<SrcSetItem> = vec![];
    let mut rest = srcset.trim_start_matches(|c: char| WHITESPACES.contains(&c) || c == ',');

    while !rest.is_empty() {
        // URL 读到空白为止；URL 末尾的逗号属于分隔符
        let url_end = rest.find(WHITESPACES).unwrap_or(rest.len());
        let mut path = &rest[..url_end];
        let mut after = &rest[url_end..];
        let mut descriptor = "";

        if let Some(stripped) = path.strip_suffix(',') {
            path = stripped.trim_end_matches(',');
        } else {
            let trimmed = after.trim_start_matches(WHITESPACES);
            let desc_end = trimmed.find(',').unwrap_or(trimmed.len());
            descriptor = trimmed[..desc_end].trim_matches(WHITESPACES);
            after = &trimmed[desc_end..];
        }

        if !path.is_empty() {
            srcset_items.push(SrcSetItem { path, descriptor });
        }

        rest = after.trim_start_matches(|c: char| WHITESPACES.contains(&c) || c == ',');
    }

    srcset_items
}
