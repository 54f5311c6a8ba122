//! 翻译后端接口
//!
//! 引擎只把载体文档交给后端，不关心后端如何翻译。后端失败时引擎整体
//! 回退为原文，因此这里的错误只用于日志。

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译后端
///
/// `language` 是本次调用的目标语言，总是显式传入。
pub trait Translator {
    fn translate(&self, content: &str, language: &str) -> TranslationResult<String>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate(&self, content: &str, language: &str) -> TranslationResult<String> {
        (**self).translate(content, language)
    }
}

/// 模拟后端的行为
#[derive(Debug, Clone)]
pub enum MockMode {
    /// 原样返回
    Identity,
    /// 依次做子串替换
    Replace(Vec<(String, String)>),
    /// 总是失败
    Fail(String),
}

/// 测试用的后端
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    calls: AtomicUsize,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn identity() -> Self {
        Self::new(MockMode::Identity)
    }

    pub fn with_replacements<I, A, B>(replacements: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self::new(MockMode::Replace(
            replacements
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        ))
    }

    pub fn failing() -> Self {
        Self::new(MockMode::Fail("backend unavailable".to_string()))
    }

    /// 被调用的次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Translator for MockTranslator {
    fn translate(&self, content: &str, _language: &str) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.mode {
            MockMode::Identity => Ok(content.to_string()),
            MockMode::Replace(replacements) => Ok(replacements
                .iter()
                .fold(content.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))),
            MockMode::Fail(message) => Err(TranslationError::TranslationServiceError(message.clone())),
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpTranslator;

#[cfg(feature = "http")]
mod http {
    use serde::{Deserialize, Serialize};

    use super::Translator;
    use crate::translation::config::BackendConfig;
    use crate::translation::error::{TranslationError, TranslationResult};

    #[derive(Serialize)]
    struct TranslateRequest<'a> {
        content: &'a str,
        language: &'a str,
    }

    #[derive(Deserialize)]
    struct TranslateResponse {
        content: String,
    }

    /// 通过 HTTP 调用的阻塞式后端
    ///
    /// 请求体为 `{"content", "language"}`，响应体为 `{"content"}`。
    pub struct HttpTranslator {
        client: reqwest::blocking::Client,
        api_url: String,
    }

    impl HttpTranslator {
        pub fn new(config: &BackendConfig) -> TranslationResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(config.timeout())
                .build()
                .map_err(|e| TranslationError::NetworkError(format!("创建HTTP客户端失败: {}", e)))?;

            Ok(Self {
                client,
                api_url: config.api_url.clone(),
            })
        }

        pub fn api_url(&self) -> &str {
            &self.api_url
        }
    }

    impl std::fmt::Debug for HttpTranslator {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HttpTranslator")
                .field("api_url", &self.api_url)
                .finish()
        }
    }

    impl Translator for HttpTranslator {
        fn translate(&self, content: &str, language: &str) -> TranslationResult<String> {
            let body = serde_json::to_string(&TranslateRequest { content, language })?;

            tracing::debug!("请求翻译后端: {} ({} 字节)", self.api_url, body.len());
            let response = self
                .client
                .post(&self.api_url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .map_err(|e| TranslationError::NetworkError(format!("请求失败: {}", e)))?;

            let status = response.status();
            let text = response
                .text()
                .map_err(|e| TranslationError::NetworkError(format!("读取响应失败: {}", e)))?;

            if !status.is_success() {
                return Err(TranslationError::NetworkError(format!(
                    "后端返回 {}: {}",
                    status, text
                )));
            }

            let parsed: TranslateResponse = serde_json::from_str(&text).map_err(|e| {
                TranslationError::SerializationError(format!("无法解析后端响应: {}", e))
            })?;
            Ok(parsed.content)
        }
    }
}
