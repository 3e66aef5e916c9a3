//! Image-to-text strategies
//!
//! - `TesseractOcr`: tesseract in a docker container, one process per image
//! - `VisionOcr`: a vision-capable model behind the completion service

use super::ImageToText;
use crate::ai::client::{CompletionClient, DEFAULT_TEMPERATURE};
use crate::ai::prompts::PromptTemplate;
use crate::error::{DocsortError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Container image providing the tesseract binary
pub const TESSERACT_IMAGE: &str = "tesseractshadow/tesseract4re";

/// Local OCR through `docker run ... tesseract <image> stdout -l <lang>`
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
    container_image: String,
}

impl TesseractOcr {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            container_image: TESSERACT_IMAGE.to_string(),
        }
    }

    pub fn with_container_image(mut self, image: &str) -> Self {
        self.container_image = image.to_string();
        self
    }

    /// Arguments passed to `docker` for one image
    pub fn docker_args(&self, image: &Path) -> Result<Vec<String>> {
        let absolute = image
            .canonicalize()
            .map_err(|e| DocsortError::extraction(image, format!("Cannot resolve image path: {}", e)))?;
        let (dir, name) = match (absolute.parent(), absolute.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_string_lossy().to_string()),
            _ => return Err(DocsortError::extraction(image, "Image path has no parent directory")),
        };

        Ok(vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/data", dir.display()),
            self.container_image.clone(),
            "tesseract".to_string(),
            format!("/data/{}", name),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ])
    }

    fn run_blocking(image: &Path, args: Vec<String>) -> Result<String> {
        let output = duct::cmd("docker", args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| DocsortError::extraction(image, format!("Failed to start OCR process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocsortError::extraction(
                image,
                format!("OCR process exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ImageToText for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn image_to_text(&self, image: &Path) -> Result<String> {
        let args = self.docker_args(image)?;
        let image_path = image.to_path_buf();

        tracing::debug!("[Tesseract] Recognizing {} ({})", image.display(), self.language);

        tokio::task::spawn_blocking(move || Self::run_blocking(&image_path, args))
            .await
            .map_err(|e| DocsortError::extraction(image, format!("OCR task failed: {}", e)))?
    }
}

/// OCR by asking a vision model to transcribe the image
#[derive(Debug, Clone)]
pub struct VisionOcr {
    client: CompletionClient,
    temperature: f32,
}

impl VisionOcr {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[async_trait]
impl ImageToText for VisionOcr {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn image_to_text(&self, image: &Path) -> Result<String> {
        tracing::debug!(
            "[VisionOcr] Transcribing {} with {}",
            image.display(),
            self.client.model()
        );
        let prompt = PromptTemplate::ExtractImageContent.text();
        self.client
            .describe_image(prompt, image, self.temperature)
            .await
            .map_err(|e| match e {
                DocsortError::Extraction { .. } => e,
                other => DocsortError::extraction(image, other.to_string()),
            })
    }
}
