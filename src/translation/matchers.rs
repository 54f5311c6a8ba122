//! 结构匹配器
//!
//! 描述如何在一段较大的文本中定位内嵌的 JSON/JS 字面量，以及如何
//! 把修改后的字面量写回去。每种定位方式是一个独立的类型，匹配逻辑
//! 可以脱离具体页面单独测试。

use std::ops::Range;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::translation::config::EngineConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 替换模板中的 JSON 占位符
pub const JSON_DATA_TOKEN: &str = "$$JSON_DATA$$";

/// 与 `encodeURIComponent` 相同的保留字符集
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 匹配器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatcherMode {
    /// 正则捕获脚本中的 JS 字面量
    #[default]
    Script,
    /// 属性值为 JSON
    AttributeJson,
    /// 属性值为普通字符串
    AttributeString,
    /// 按 id 精确定位的 JSON 脚本块
    AppJson,
    /// 正则捕获的复数词条目录
    I18n,
}

impl MatcherMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherMode::Script => "script",
            MatcherMode::AttributeJson => "attribute_json",
            MatcherMode::AttributeString => "attribute_string",
            MatcherMode::AppJson => "app_json",
            MatcherMode::I18n => "i18n",
        }
    }
}

fn default_position() -> usize {
    1
}

/// 匹配器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub name: String,
    /// 正则（script/i18n）、脚本 id（app_json）或属性名（attribute_*）
    pub key: String,
    /// 替换模板，含 `$$JSON_DATA$$`；缺省时只替换捕获组
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default = "default_position")]
    pub position: usize,
    /// 字面量经过 URL 编码
    #[serde(default)]
    pub encode: bool,
    /// 只收集被规则显式允许的字段
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub mode: MatcherMode,
    /// 属性匹配器限定的标签名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// i18n 目录在 JSON 中的位置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
}

impl MatcherConfig {
    pub fn new(name: impl Into<String>, key: impl Into<String>, mode: MatcherMode) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            replacement: None,
            position: default_position(),
            encode: false,
            strict: false,
            mode,
            tag: None,
            catalog_path: None,
        }
    }

    pub fn with_replacement(mut self, template: impl Into<String>) -> Self {
        self.replacement = Some(template.into());
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_catalog_path(mut self, path: impl Into<String>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    pub fn encoded(mut self) -> Self {
        self.encode = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.name.trim().is_empty() {
            return Err(TranslationError::ConfigError("匹配器名称不能为空".to_string()));
        }
        if self.key.trim().is_empty() {
            return Err(TranslationError::ConfigError(format!(
                "匹配器 `{}` 的 key 不能为空",
                self.name
            )));
        }
        if self.position == 0 {
            return Err(TranslationError::ConfigError(format!(
                "匹配器 `{}` 的 position 必须从1开始",
                self.name
            )));
        }
        if matches!(self.mode, MatcherMode::Script | MatcherMode::I18n) {
            if let Some(template) = &self.replacement {
                if !template.contains(JSON_DATA_TOKEN) {
                    return Err(TranslationError::ConfigError(format!(
                        "匹配器 `{}` 的替换模板缺少 {}",
                        self.name, JSON_DATA_TOKEN
                    )));
                }
            }
        }
        Ok(())
    }
}

/// 字面量的 URL 编解码与脚本上下文转义
#[derive(Debug, Clone, Copy)]
struct LiteralCodec {
    encode: bool,
}

impl LiteralCodec {
    fn decode(&self, raw: &str) -> Option<String> {
        if !self.encode {
            return Some(raw.to_string());
        }
        let spaced = raw.replace('+', " ");
        percent_decode_str(&spaced)
            .decode_utf8()
            .ok()
            .map(|decoded| decoded.into_owned())
    }

    fn encode(&self, json: &str) -> String {
        if self.encode {
            utf8_percent_encode(json, URI_COMPONENT).to_string()
        } else {
            escape_script_json(json)
        }
    }
}

/// 写入 `<script>` 内容的 JSON 需要把 `</` 转义为 `<\/`
pub fn escape_script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn compile_regex(pattern: &str, name: &str) -> TranslationResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| TranslationError::from(e).with_context(format!("匹配器 `{}`", name)))
}

/// 正则捕获的 JS 字面量
#[derive(Debug)]
pub struct ScriptLiteralMatcher {
    name: String,
    regex: Regex,
    replacement: Option<String>,
    position: usize,
    codec: LiteralCodec,
    strict: bool,
}

impl ScriptLiteralMatcher {
    pub fn compile(config: &MatcherConfig) -> TranslationResult<Self> {
        Ok(Self {
            name: config.name.clone(),
            regex: compile_regex(&config.key, &config.name)?,
            replacement: config.replacement.clone(),
            position: config.position,
            codec: LiteralCodec {
                encode: config.encode,
            },
            strict: config.strict,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    fn capture<'h>(&self, caps: &Captures<'h>) -> Option<regex::Match<'h>> {
        caps.get(self.position)
    }

    /// 读取第一个匹配中的字面量（已解码）
    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        self.codec.decode(self.capture(&caps)?.as_str())
    }

    /// 用 `rewrite` 改写字面量并写回第一个匹配
    ///
    /// 未匹配、解码失败或 `rewrite` 返回 `None` 时返回 `None`。
    pub fn patch<F>(&self, text: &str, rewrite: F) -> Option<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let caps = self.regex.captures(text)?;
        let literal = self.capture(&caps)?;
        let decoded = self.codec.decode(literal.as_str())?;
        let encoded = self.codec.encode(&rewrite(&decoded)?);

        let (range, replacement) = match &self.replacement {
            None => (literal.range(), encoded),
            Some(template) => {
                let whole = caps.get(0)?;
                (whole.range(), expand_template(&caps, template, &encoded))
            }
        };

        Some(splice(text, range, &replacement))
    }
}

/// 展开替换模板：`$1`、`${name}` 取捕获组，`$$JSON_DATA$$` 取新字面量
fn expand_template(caps: &Captures, template: &str, literal: &str) -> String {
    let mut expanded = String::new();
    for (index, part) in template.split(JSON_DATA_TOKEN).enumerate() {
        if index > 0 {
            expanded.push_str(literal);
        }
        caps.expand(part, &mut expanded);
    }
    expanded
}

fn splice(text: &str, range: Range<usize>, replacement: &str) -> String {
    let mut patched = String::with_capacity(text.len() + replacement.len());
    patched.push_str(&text[..range.start]);
    patched.push_str(replacement);
    patched.push_str(&text[range.end..]);
    patched
}

/// 按 id 精确定位的 JSON 脚本块，整个内容即字面量
#[derive(Debug)]
pub struct AppJsonMatcher {
    name: String,
    id: String,
    regex: Regex,
    codec: LiteralCodec,
    strict: bool,
}

impl AppJsonMatcher {
    pub fn compile(config: &MatcherConfig) -> TranslationResult<Self> {
        let pattern = format!(
            r#"(?is)<script\b[^>]*\bid\s*=\s*["']{}["'][^>]*>(.*?)</script\s*>"#,
            regex::escape(config.key.trim())
        );
        Ok(Self {
            name: config.name.clone(),
            id: config.key.trim().to_string(),
            regex: compile_regex(&pattern, &config.name)?,
            codec: LiteralCodec {
                encode: config.encode,
            },
            strict: config.strict,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        self.codec.decode(caps.get(1)?.as_str().trim())
    }

    pub fn patch<F>(&self, text: &str, rewrite: F) -> Option<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let caps = self.regex.captures(text)?;
        let body = caps.get(1)?;
        let raw = body.as_str();
        let trimmed = raw.trim();
        let decoded = self.codec.decode(trimmed)?;
        let encoded = self.codec.encode(&rewrite(&decoded)?);

        // 只替换去掉首尾空白后的部分
        let start = body.start() + (raw.len() - raw.trim_start().len());
        Some(splice(text, start..start + trimmed.len(), &encoded))
    }
}

/// DOM 属性匹配器
#[derive(Debug)]
pub struct AttributeMatcher {
    name: String,
    attribute: String,
    tag: Option<String>,
    json: bool,
    strict: bool,
}

impl AttributeMatcher {
    pub fn compile(config: &MatcherConfig) -> Self {
        Self {
            name: config.name.clone(),
            attribute: config.key.trim().to_ascii_lowercase(),
            tag: config.tag.as_ref().map(|tag| tag.trim().to_ascii_lowercase()),
            json: config.mode == MatcherMode::AttributeJson,
            strict: config.strict,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// 属性值按 JSON 解码（否则按普通字符串）
    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// 标签名是否在匹配范围内
    pub fn applies_to(&self, tag_name: &str) -> bool {
        self.tag
            .as_deref()
            .map_or(true, |tag| tag.eq_ignore_ascii_case(tag_name))
    }
}

/// 复数词条目录匹配器
#[derive(Debug)]
pub struct I18nMatcher {
    literal: ScriptLiteralMatcher,
    catalog_path: Vec<String>,
}

/// 默认的目录位置
pub const DEFAULT_CATALOG_PATH: &str = "locale_data.messages";

impl I18nMatcher {
    pub fn compile(config: &MatcherConfig) -> TranslationResult<Self> {
        let catalog_path = config
            .catalog_path
            .as_deref()
            .unwrap_or(DEFAULT_CATALOG_PATH)
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            literal: ScriptLiteralMatcher::compile(config)?,
            catalog_path,
        })
    }

    pub fn name(&self) -> &str {
        self.literal.name()
    }

    pub fn literal(&self) -> &ScriptLiteralMatcher {
        &self.literal
    }

    /// 目录对象在 JSON 中的键路径
    pub fn catalog_path(&self) -> &[String] {
        &self.catalog_path
    }
}

/// 编译后的结构匹配器
#[derive(Debug)]
pub enum StructuralMatcher {
    ScriptLiteral(ScriptLiteralMatcher),
    AppJson(AppJsonMatcher),
    Attribute(AttributeMatcher),
    I18n(I18nMatcher),
}

impl StructuralMatcher {
    pub fn compile(config: &MatcherConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(match config.mode {
            MatcherMode::Script => StructuralMatcher::ScriptLiteral(ScriptLiteralMatcher::compile(config)?),
            MatcherMode::AppJson => StructuralMatcher::AppJson(AppJsonMatcher::compile(config)?),
            MatcherMode::AttributeJson | MatcherMode::AttributeString => {
                StructuralMatcher::Attribute(AttributeMatcher::compile(config))
            }
            MatcherMode::I18n => StructuralMatcher::I18n(I18nMatcher::compile(config)?),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            StructuralMatcher::ScriptLiteral(matcher) => matcher.name(),
            StructuralMatcher::AppJson(matcher) => matcher.name(),
            StructuralMatcher::Attribute(matcher) => matcher.name(),
            StructuralMatcher::I18n(matcher) => matcher.name(),
        }
    }

    /// 片段组键的第二部分（属性匹配器按出现序号另行编号）
    pub fn group_param(&self) -> &'static str {
        match self {
            StructuralMatcher::ScriptLiteral(_) => MatcherMode::Script.as_str(),
            StructuralMatcher::AppJson(_) => MatcherMode::AppJson.as_str(),
            StructuralMatcher::Attribute(_) => "attribute",
            StructuralMatcher::I18n(_) => MatcherMode::I18n.as_str(),
        }
    }
}

/// 编译后的不可变匹配器集合，按配置顺序保存
#[derive(Debug, Default)]
pub struct MatcherSet {
    matchers: Vec<StructuralMatcher>,
}

impl MatcherSet {
    pub fn new(configs: &[MatcherConfig]) -> TranslationResult<Self> {
        let matchers = configs
            .iter()
            .map(StructuralMatcher::compile)
            .collect::<TranslationResult<Vec<_>>>()?;
        Ok(Self { matchers })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> TranslationResult<Self> {
        let set = Self::new(&config.matchers)?;
        tracing::debug!("匹配器已编译: {} 个", set.len());
        Ok(set)
    }

    pub fn get(&self, name: &str) -> Option<&StructuralMatcher> {
        self.matchers.iter().find(|matcher| matcher.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructuralMatcher> {
        self.matchers.iter()
    }

    pub fn attribute_matchers(&self) -> impl Iterator<Item = &AttributeMatcher> {
        self.matchers.iter().filter_map(|matcher| match matcher {
            StructuralMatcher::Attribute(attribute) => Some(attribute),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
