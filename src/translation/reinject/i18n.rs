//! 复数词条目录写回
//!
//! 目录以原始消息字符串为键，其中可能含有无法安全做字面匹配的引号，
//! 因此收集与写回都用键的 SHA-256 十六进制摘要作为片段路径。每个条目
//! 是按复数形式排列的字符串数组，写回只修改译文中出现的下标。

use std::collections::HashMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::translation::matchers::I18nMatcher;
use crate::translation::pipeline::filters::ValueClassifier;
use crate::translation::types::{Fragment, FragmentFormat, FragmentGroup, GroupKey};

/// 目录键的摘要
pub fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn catalog<'a>(root: &'a Value, catalog_path: &[String]) -> Option<&'a Map<String, Value>> {
    catalog_path
        .iter()
        .try_fold(root, |node, segment| node.get(segment))?
        .as_object()
}

fn catalog_mut<'a>(root: &'a mut Value, catalog_path: &[String]) -> Option<&'a mut Map<String, Value>> {
    catalog_path
        .iter()
        .try_fold(root, |node, segment| node.get_mut(segment))?
        .as_object_mut()
}

/// 从目录中收集所有非空的复数形式
///
/// 空键 `""` 是目录头，跳过。
pub fn collect_catalog(root: &Value, catalog_path: &[String], classifier: &ValueClassifier) -> Vec<Fragment> {
    let Some(entries) = catalog(root, catalog_path) else {
        return Vec::new();
    };

    let mut fragments = Vec::new();
    for (message_key, forms) in entries {
        if message_key.is_empty() {
            continue;
        }
        let Some(forms) = forms.as_array() else {
            continue;
        };

        let hash = hash_key(message_key);
        for (index, form) in forms.iter().enumerate() {
            if let Some(text) = form.as_str().filter(|text| !text.trim().is_empty()) {
                let format = classifier.markup_format(text).unwrap_or(FragmentFormat::Text);
                fragments.push(Fragment::new(hash.clone(), text, format).with_plural_index(index));
            }
        }
    }
    fragments
}

/// 把译文写入目录，返回修改的复数形式数量
pub fn patch_catalog<'a, I>(root: &mut Value, catalog_path: &[String], fragments: I) -> usize
where
    I: IntoIterator<Item = &'a Fragment>,
{
    let translations: HashMap<(&str, usize), &str> = fragments
        .into_iter()
        .filter(|fragment| !fragment.skip)
        .filter_map(|fragment| {
            fragment
                .plural_index
                .map(|index| ((fragment.path.as_str(), index), fragment.value.as_str()))
        })
        .collect();
    if translations.is_empty() {
        return 0;
    }

    let Some(entries) = catalog_mut(root, catalog_path) else {
        return 0;
    };

    let mut patched = 0;
    for (message_key, forms) in entries.iter_mut() {
        if message_key.is_empty() {
            continue;
        }
        let Some(forms) = forms.as_array_mut() else {
            continue;
        };

        let hash = hash_key(message_key);
        for (index, form) in forms.iter_mut().enumerate() {
            if let Some(value) = translations.get(&(hash.as_str(), index)) {
                *form = Value::String((*value).to_string());
                patched += 1;
            }
        }
    }
    patched
}

/// 定位目录字面量并收集片段
pub fn collect(text: &str, matcher: &I18nMatcher, classifier: &ValueClassifier) -> Option<Vec<Fragment>> {
    let literal = matcher.literal().extract(text)?;
    match serde_json::from_str::<Value>(&literal) {
        Ok(root) => Some(collect_catalog(&root, matcher.catalog_path(), classifier)),
        Err(e) => {
            tracing::debug!("目录 `{}` 不是JSON: {}", matcher.name(), e);
            None
        }
    }
}

/// 把一个 I18n 组写回原文，锚点缺失时原样返回
pub fn apply(text: &str, matcher: &I18nMatcher, key: &GroupKey, group: &FragmentGroup) -> String {
    let patched = matcher.literal().patch(text, |literal| {
        let mut root: Value = match serde_json::from_str(literal) {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!("组 [{}] 的目录无法解码: {}", key, e);
                return None;
            }
        };
        let count = patch_catalog(&mut root, matcher.catalog_path(), &group.fragments);
        tracing::debug!("组 [{}] 写回 {} 个复数形式", key, count);
        serde_json::to_string(&root).ok()
    });

    patched.unwrap_or_else(|| {
        tracing::warn!("组 [{}] 没有找到目录，保留原文", key);
        text.to_string()
    })
}
