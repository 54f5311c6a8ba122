//! 片段数据模型
//!
//! 一次提取调用生成一组全新的 `FragmentGroups`，它只在一次
//! 收集 → 载体 → 翻译 → 写回 的往返中存在，不做持久化。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::translation::error::TranslationError;

/// 片段格式，决定片段在载体文档中的包装方式以及返回时的解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FragmentFormat {
    /// 普通文本
    Text,
    /// 链接
    Link,
    /// 单张图片地址
    MediaImage,
    /// `srcset` 形式的图片集合
    MediaImageSet,
    /// 内嵌 HTML 片段
    Html,
    /// 结构完整（可按 XML 解析）的内嵌 HTML
    HtmlMain,
}

impl FragmentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentFormat::Text => "text",
            FragmentFormat::Link => "link",
            FragmentFormat::MediaImage => "media-img",
            FragmentFormat::MediaImageSet => "media-imgset",
            FragmentFormat::Html => "html",
            FragmentFormat::HtmlMain => "html-main",
        }
    }

    /// 是否为 HTML 类格式（返回时不做实体解码）
    pub fn is_markup(&self) -> bool {
        matches!(self, FragmentFormat::Html | FragmentFormat::HtmlMain)
    }
}

impl fmt::Display for FragmentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentFormat {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(FragmentFormat::Text),
            "link" => Ok(FragmentFormat::Link),
            "media-img" | "media-image" => Ok(FragmentFormat::MediaImage),
            "media-imgset" | "media-imageset" => Ok(FragmentFormat::MediaImageSet),
            "html" => Ok(FragmentFormat::Html),
            "html-main" => Ok(FragmentFormat::HtmlMain),
            other => Err(TranslationError::InvalidInput(format!(
                "未知的片段格式: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for FragmentFormat {
    type Error = TranslationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FragmentFormat> for String {
    fn from(format: FragmentFormat) -> Self {
        format.as_str().to_string()
    }
}

/// 片段组的写回模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FragmentMode {
    /// 整体 JSON 路径写回
    #[default]
    Auto,
    /// 正则定位的脚本字面量写回
    Override,
    /// DOM 属性写回
    Attribute,
    /// 哈希键的复数词条目录写回
    I18n,
    /// 仅占位，不写回
    Skip,
}

impl FragmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentMode::Auto => "auto",
            FragmentMode::Override => "override",
            FragmentMode::Attribute => "attribute",
            FragmentMode::I18n => "i18n",
            FragmentMode::Skip => "skip",
        }
    }
}

impl fmt::Display for FragmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentMode {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(FragmentMode::Auto),
            "override" => Ok(FragmentMode::Override),
            "attribute" => Ok(FragmentMode::Attribute),
            "i18n" => Ok(FragmentMode::I18n),
            "skip" => Ok(FragmentMode::Skip),
            other => Err(TranslationError::InvalidInput(format!(
                "未知的片段模式: {}",
                other
            ))),
        }
    }
}

/// 一个可翻译单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 结构定位：JSON 路径、属性名，或 i18n 词条键的哈希
    pub path: String,
    /// 当前文本（原文或译文）
    pub value: String,
    pub format: FragmentFormat,
    /// 为真时片段只占位，不翻译也不写回
    pub skip: bool,
    /// i18n 复数形式下标
    pub plural_index: Option<usize>,
    /// 片段在载体文档中的原始子串，写回后用于清理
    pub carrier_marker: Option<String>,
}

impl Fragment {
    /// 创建新的片段
    pub fn new(path: impl Into<String>, value: impl Into<String>, format: FragmentFormat) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            format,
            skip: false,
            plural_index: None,
            carrier_marker: None,
        }
    }

    pub fn with_plural_index(mut self, index: usize) -> Self {
        self.plural_index = Some(index);
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// 忽略载体标记后是否相同
    pub fn same_content(&self, other: &Fragment) -> bool {
        self.path == other.path
            && self.value == other.value
            && self.format == other.format
            && self.skip == other.skip
            && self.plural_index == other.plural_index
    }
}

/// 同一来源（一个 JS 对象、一个属性或一个词条目录）的片段集合
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentGroup {
    pub mode: FragmentMode,
    /// 属性模式下读取属性值的 HTML 标签名
    pub attribute_tag: Option<String>,
    pub fragments: Vec<Fragment>,
}

impl FragmentGroup {
    pub fn new(mode: FragmentMode) -> Self {
        Self {
            mode,
            attribute_tag: None,
            fragments: Vec::new(),
        }
    }

    pub fn with_fragments(mode: FragmentMode, fragments: Vec<Fragment>) -> Self {
        Self {
            mode,
            attribute_tag: None,
            fragments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// 需要写回的片段（排除 skip）
    pub fn active_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(|fragment| !fragment.skip)
    }

    /// 忽略载体标记后是否相同
    pub fn same_content(&self, other: &FragmentGroup) -> bool {
        self.mode == other.mode
            && self.attribute_tag == other.attribute_tag
            && self.fragments.len() == other.fragments.len()
            && self
                .fragments
                .iter()
                .zip(other.fragments.iter())
                .all(|(a, b)| a.same_content(b))
    }
}

/// 片段组键 `(group_name, group_param)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub name: String,
    pub param: String,
}

impl GroupKey {
    pub fn new(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.param)
    }
}

/// 按组键索引、保持插入顺序的片段组集合
///
/// 同一键的后续片段合并进已有组，不会替换。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentGroups {
    entries: Vec<(GroupKey, FragmentGroup)>,
}

impl FragmentGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个片段组：键已存在时追加片段
    pub fn merge(&mut self, key: GroupKey, group: FragmentGroup) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing)) => {
                if existing.attribute_tag.is_none() {
                    existing.attribute_tag = group.attribute_tag;
                }
                existing.fragments.extend(group.fragments);
            }
            None => self.entries.push((key, group)),
        }
    }

    /// 向指定组追加单个片段，组不存在时以给定模式创建
    pub fn push(&mut self, key: GroupKey, mode: FragmentMode, fragment: Fragment) {
        self.merge(key, FragmentGroup::with_fragments(mode, vec![fragment]));
    }

    pub fn get(&self, key: &GroupKey) -> Option<&FragmentGroup> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, group)| group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &FragmentGroup)> {
        self.entries.iter().map(|(key, group)| (key, group))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有组的片段总数
    pub fn fragment_count(&self) -> usize {
        self.entries.iter().map(|(_, group)| group.fragments.len()).sum()
    }

    /// 忽略载体标记后是否相同
    pub fn same_content(&self, other: &FragmentGroups) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((ka, ga), (kb, gb))| ka == kb && ga.same_content(gb))
    }
}

impl IntoIterator for FragmentGroups {
    type Item = (GroupKey, FragmentGroup);
    type IntoIter = std::vec::IntoIter<(GroupKey, FragmentGroup)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
