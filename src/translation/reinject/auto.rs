//! 整体 JSON 路径写回

use serde_json::Value;

use crate::translation::error::PathError;
use crate::translation::pipeline::path;
use crate::translation::types::{Fragment, FragmentGroup, GroupKey};

/// 写回结果：新树以及逐片段的路径错误
#[derive(Debug, Clone, PartialEq)]
pub struct AutoPatch {
    pub value: Value,
    pub errors: Vec<PathError>,
}

impl AutoPatch {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 在原始树的副本上逐个写入片段
///
/// 跳过 `skip` 片段；单个片段的路径错误只记录，不影响其余片段。
pub fn apply<'a, I>(original: &Value, fragments: I) -> AutoPatch
where
    I: IntoIterator<Item = &'a Fragment>,
{
    let mut value = original.clone();
    let mut errors = Vec::new();

    for fragment in fragments.into_iter().filter(|fragment| !fragment.skip) {
        if let Err(error) = path::set(&mut value, &fragment.path, fragment.value.clone()) {
            errors.push(error);
        }
    }

    AutoPatch { value, errors }
}

/// 写回一个片段组并记录错误
pub fn apply_group(original: &Value, key: &GroupKey, group: &FragmentGroup) -> Value {
    let patch = apply(original, &group.fragments);
    for error in &patch.errors {
        tracing::warn!("片段写回失败 [{}] path={}: {}", key, error.path(), error);
    }
    patch.value
}
