//! Text Extraction
//!
//! Turns an input file into raw text:
//! - PDF: every page rendered at 300 DPI, each page through the strategy
//! - PNG/JPEG: straight to the strategy
//! - anything else: read as UTF-8
//!
//! The image-to-text strategy is injected, so the extractor does not know
//! whether a local OCR engine or a vision model reads the pixels.

pub mod normalize;
pub mod ocr;
pub mod pdf;

pub use normalize::normalize;
pub use ocr::{TesseractOcr, VisionOcr};
pub use pdf::PdfRenderer;

use crate::error::{DocsortError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Capability: read the text in one image file
#[async_trait]
pub trait ImageToText: Send + Sync {
    /// Short label for progress output
    fn name(&self) -> &'static str;

    async fn image_to_text(&self, image: &Path) -> Result<String>;
}

/// How a file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Text,
}

impl FileKind {
    /// Classify by extension (case-insensitive)
    pub fn of(path: &Path) -> Self {
        match mime_guess::from_path(path).first_raw() {
            Some("application/pdf") => Self::Pdf,
            Some("image/png") | Some("image/jpeg") => Self::Image,
            _ => Self::Text,
        }
    }
}

/// Text extractor with an injected image-to-text strategy
#[derive(Clone)]
pub struct TextExtractor {
    strategy: Arc<dyn ImageToText>,
    renderer: PdfRenderer,
}

impl TextExtractor {
    pub fn new(strategy: Arc<dyn ImageToText>) -> Self {
        Self {
            strategy,
            renderer: PdfRenderer::new(),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Extract the raw text of `path`
    pub async fn extract(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(DocsortError::extraction(path, "Not a readable file"));
        }

        let kind = FileKind::of(path);
        tracing::debug!("[Extractor] {} as {:?}", path.display(), kind);

        match kind {
            FileKind::Pdf => self.extract_pdf(path).await,
            FileKind::Image => self.strategy.image_to_text(path).await,
            FileKind::Text => Self::read_text(path).await,
        }
    }

    async fn extract_pdf(&self, path: &Path) -> Result<String> {
        // Page images are removed when `rendered` drops, on every exit path
        let rendered = self.renderer.render_pages(path).await?;

        let mut text = String::new();
        for (index, page) in rendered.pages().iter().enumerate() {
            let page_text = self.strategy.image_to_text(page).await.map_err(|e| {
                DocsortError::extraction(path, format!("Page {}: {}", index + 1, e))
            })?;
            text.push_str(&page_text);
        }

        tracing::debug!(
            "[Extractor] {} page(s), {} chars from {}",
            rendered.pages().len(),
            text.len(),
            path.display()
        );
        Ok(text)
    }

    async fn read_text(path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocsortError::extraction(path, format!("Failed to read file: {}", e)))?;

        String::from_utf8(bytes)
            .map_err(|_| DocsortError::extraction(path, "File is neither PDF, image, nor UTF-8 text"))
    }
}
