//! 引擎核心
//!
//! - **引擎层** (`engine.rs`): 收集、载体编解码与写回的编排
//! - **后端层** (`backend.rs`): 翻译后端接口及其实现

pub mod backend;
pub mod engine;

pub use backend::{MockMode, MockTranslator, Translator};
#[cfg(feature = "http")]
pub use backend::HttpTranslator;
pub use engine::{CollectedPage, EngineStats, EngineStatsSnapshot, FragmentEngine};
