//! Error types shared across the crate
//!
//! Each variant maps to one failure class of the categorization run:
//! extraction, the completion service, model output, placement on disk,
//! and startup configuration. `Stage` wraps the last cause once a retried
//! pipeline stage has used up its attempts.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocsortError>;

#[derive(Debug, Error)]
pub enum DocsortError {
    /// Source unreadable, unsupported, or the OCR step failed
    #[error("Extraction failed for {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    /// Transport error or non-success status from the completion service
    #[error("Completion service failed: {0}")]
    Service(String),

    /// Response lacked an expected field or held no parseable JSON object
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// Directory creation or the move itself failed
    #[error("Placement failed for {}: {message}", path.display())]
    Placement { path: PathBuf, message: String },

    /// Missing or invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A pipeline stage failed on every attempt
    #[error("{stage} failed after {attempts} attempt(s): {source}")]
    Stage {
        stage: &'static str,
        attempts: usize,
        #[source]
        source: Box<DocsortError>,
    },
}

impl DocsortError {
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn placement(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Placement {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Name of the failed stage, if this error came out of the retry loop
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DocsortError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            DocsortError::Service(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            DocsortError::MalformedOutput(format!("Undecodable response body: {}", err))
        } else {
            DocsortError::Service(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DocsortError {
    fn from(err: serde_json::Error) -> Self {
        DocsortError::MalformedOutput(err.to_string())
    }
}
