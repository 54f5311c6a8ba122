//! 片段收集器
//!
//! 递归遍历 JSON 树，结合键过滤规则与值分类器，生成带结构路径的
//! 扁平片段列表。写回时假设树的形状与收集时相同。

use serde_json::Value;

use crate::translation::pipeline::filters::ValueClassifier;
use crate::translation::pipeline::path::{push_index, push_key};
use crate::translation::pipeline::rules::{KeyDecision, RuleSet};
use crate::translation::types::Fragment;

/// 片段收集器
pub struct FragmentCollector<'a> {
    rules: &'a RuleSet,
    classifier: &'a ValueClassifier,
    /// 严格模式：只收集被规则显式允许的字段
    strict: bool,
}

impl<'a> FragmentCollector<'a> {
    /// 创建新的收集器
    pub fn new(rules: &'a RuleSet, classifier: &'a ValueClassifier, strict: bool) -> Self {
        Self {
            rules,
            classifier,
            strict,
        }
    }

    /// 收集整棵树中的可翻译字符串
    pub fn collect(&self, tree: &Value) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        self.walk(tree, "", "", &mut fragments);

        tracing::trace!(
            "收集完成: {} 个片段 (strict={})",
            fragments.len(),
            self.strict
        );
        fragments
    }

    /// 判断单个字符串字段是否收集
    ///
    /// `key` 为用于规则匹配的键名，`path` 为完整路径。
    pub fn collect_scalar(&self, key: &str, path: &str, value: &str) -> Option<Fragment> {
        if value.is_empty() {
            return None;
        }

        let decision = self.rules.resolve(key, path);
        if self.strict && !decision.is_explicit_allow() {
            return None;
        }
        if decision == KeyDecision::Deny {
            return None;
        }

        let format = self.classifier.resolve_format(value, &decision)?;
        Some(Fragment::new(path, value, format))
    }

    fn walk(&self, value: &Value, key: &str, path: &str, out: &mut Vec<Fragment>) {
        match value {
            Value::Object(map) => {
                for (child_key, child) in map {
                    self.walk(child, child_key, &push_key(path, child_key), out);
                }
            }
            // 数组元素沿用最近的对象键参与规则匹配
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.walk(item, key, &push_index(path, index), out);
                }
            }
            Value::String(text) => {
                if let Some(fragment) = self.collect_scalar(key, path, text) {
                    out.push(fragment);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}
