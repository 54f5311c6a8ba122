use std::error::Error;
use std::fmt;

use crate::translation::error::TranslationError;

/// Represents errors that can surface at the crate boundary
///
/// The engine itself never fails a request because of malformed content;
/// this error type is used where the caller genuinely has to react
/// (loading configuration, reading input files, the CLI).
#[derive(Debug)]
pub struct FragmentError {
    details: String,
}

impl FragmentError {
    /// Creates a new FragmentError with the given message
    ///
    /// # Arguments
    ///
    /// * `msg` - The error message describing what went wrong
    pub fn new(msg: &str) -> FragmentError {
        FragmentError {
            details: msg.to_string(),
        }
    }
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl Error for FragmentError {}

impl From<TranslationError> for FragmentError {
    fn from(error: TranslationError) -> Self {
        FragmentError::new(&error.to_string())
    }
}

impl From<std::io::Error> for FragmentError {
    fn from(error: std::io::Error) -> Self {
        FragmentError::new(&format!("IO错误: {}", error))
    }
}

/// Kind of content handed to the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ContentKind {
    /// A full or partial HTML page with embedded scripts and attributes
    #[default]
    Html,
    /// A raw JSON payload
    Json,
}

impl ContentKind {
    /// Guesses the content kind from the first non-whitespace character
    pub fn sniff(content: &str) -> ContentKind {
        match content.trim_start().chars().next() {
            Some('{') | Some('[') => ContentKind::Json,
            _ => ContentKind::Html,
        }
    }
}
