use html5ever::serialize::{serialize, SerializeOpts};
use markup5ever_rcdom::{RcDom, SerializableHandle};

use crate::translation::error::{TranslationError, TranslationResult};

/// 序列化文档
pub fn serialize_document(dom: RcDom) -> TranslationResult<String> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .map_err(|e| TranslationError::SerializationError(format!("DOM序列化失败: {}", e)))?;

    String::from_utf8(buf)
        .map_err(|e| TranslationError::SerializationError(format!("DOM输出不是UTF-8: {}", e)))
}
