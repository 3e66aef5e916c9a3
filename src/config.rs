//! Process-wide configuration
//!
//! Loaded once at startup from the environment (a `.env` file is read first
//! by `run()`), read-only afterwards.

use crate::error::{DocsortError, Result};
use std::path::PathBuf;

const DEFAULT_CHAT_MODEL: &str = "llama3:8b";
const DEFAULT_IMAGE_MODEL: &str = "llama3.2-vision";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// How page and image content is turned into text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OcrMethod {
    /// Vision-capable model behind the completion service
    #[default]
    Ollama,
    /// Local tesseract binary run through docker
    Tesseract,
}

impl OcrMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Tesseract => "tesseract",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "tesseract" => Ok(Self::Tesseract),
            other => Err(DocsortError::Configuration(format!(
                "Unknown OCR method: {}",
                other
            ))),
        }
    }
}

/// Which categorization pipeline to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineMode {
    /// Summarize, then filename and path with per-stage retries
    #[default]
    Staged,
    /// One classification call returning both path and filename
    Combined,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Combined => "combined",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "staged" => Ok(Self::Staged),
            "combined" => Ok(Self::Combined),
            other => Err(DocsortError::Configuration(format!(
                "Unknown pipeline mode: {}",
                other
            ))),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chat_model: String,
    pub image_model: String,
    pub base_url: String,
    /// Root of the existing filing scheme shown to the model
    pub reference_dir: PathBuf,
    /// Root that categorized files are moved into
    pub destination_dir: PathBuf,
    pub ocr_language: String,
    pub ocr_method: OcrMethod,
    pub pipeline_mode: PipelineMode,
}

impl AppConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                DocsortError::Configuration(format!("Missing required property {}", key))
            })
        };

        let reference_dir = PathBuf::from(require("DOCUMENTS_REFDIR_BASEPATH")?);
        let destination_dir = PathBuf::from(require("DOCUMENTS_MOVEDIR_BASEPATH")?);

        let ocr_method = match get("OCR_METHOD") {
            Some(v) => OcrMethod::parse(&v)?,
            None => OcrMethod::default(),
        };
        let pipeline_mode = match get("PIPELINE_MODE") {
            Some(v) => PipelineMode::parse(&v)?,
            None => PipelineMode::default(),
        };

        Ok(Self {
            chat_model: get("AI_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            image_model: get("AI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            base_url: get("AI_CHAT_BASEURL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            reference_dir,
            destination_dir,
            ocr_language: get("OCR_LANGUAGE").unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
            ocr_method,
            pipeline_mode,
        })
    }
}
