//! PDF Rendering Module
//!
//! Rasterizes every page of a PDF to PNG for the image-to-text strategy.
//!
//! Note: pdfium-render binds the pdfium library at runtime.
//! On macOS: brew install pdfium
//! On Linux: apt install libpdfium-dev
//! Or place the library next to the binary.

use crate::error::{DocsortError, Result};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Render resolution for OCR input
pub const RENDER_DPI: f32 = 300.0;

/// PDF points per inch
const POINTS_PER_INCH: f32 = 72.0;

/// Rendered pages of one document
///
/// The page images live in a temporary directory that is removed when this
/// value is dropped, whichever way the caller leaves its scope.
pub struct RenderedPages {
    _dir: TempDir,
    pages: Vec<PathBuf>,
}

impl RenderedPages {
    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }
}

/// PDF renderer backed by pdfium
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render all pages of `path` into a fresh temporary directory
    pub async fn render_pages(&self, path: &Path) -> Result<RenderedPages> {
        let dir = tempfile::Builder::new()
            .prefix("docsort_pdf_pages")
            .tempdir()
            .map_err(|e| DocsortError::extraction(path, format!("Failed to create temp dir: {}", e)))?;

        let source = path.to_path_buf();
        let target = dir.path().to_path_buf();

        // Run in blocking task since PDF rendering is CPU-intensive
        let pages = tokio::task::spawn_blocking(move || Self::render_blocking(&source, &target))
            .await
            .map_err(|e| DocsortError::extraction(path, format!("Render task failed: {}", e)))??;

        tracing::debug!(
            "[PdfRenderer] Rendered {} page(s) of {}",
            pages.len(),
            path.display()
        );

        Ok(RenderedPages { _dir: dir, pages })
    }

    fn bind() -> std::result::Result<Pdfium, PdfiumError> {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map(Pdfium::new)
    }

    /// Render every page to `target/page_<n>.png` (blocking version)
    ///
    /// The document handle is dropped before this returns.
    fn render_blocking(source: &Path, target: &Path) -> Result<Vec<PathBuf>> {
        let fail = |message: String| DocsortError::extraction(source, message);

        let pdfium = Self::bind().map_err(|e| fail(format!("Failed to initialize pdfium: {}", e)))?;
        let document = pdfium
            .load_pdf_from_file(source, None)
            .map_err(|e| fail(format!("Failed to load PDF: {}", e)))?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(RENDER_DPI / POINTS_PER_INCH)
            .render_form_data(true)
            .render_annotations(true);

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| fail(format!("Failed to render page {}: {}", index + 1, e)))?;

            let page_path = target.join(format!("page_{}.png", index));
            bitmap
                .as_image()
                .save(&page_path)
                .map_err(|e| fail(format!("Failed to write page {}: {}", index + 1, e)))?;
            pages.push(page_path);
        }

        Ok(pages)
    }
}
