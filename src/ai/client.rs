//! Completion Service Client
//!
//! Request/response wrapper over an Ollama-compatible generation service:
//! - `POST {base}/api/generate` for plain prompts
//! - `POST {base}/api/chat` for prompts with attached images
//!
//! Calls block until the whole response is in (`stream: false`). Both
//! shapes can ask the service to constrain output to JSON.

use super::http_client::completion_client;
use crate::error::{DocsortError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Sampling temperature used when the caller does not pick one
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

const GENERATE_ENDPOINT: &str = "/api/generate";
const CHAT_ENDPOINT: &str = "/api/chat";

/// Plain text completion, the seam the pipeline talks to
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
}

/// Body of `/api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerationOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
}

/// One user turn with attached base64 images
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub images: Vec<String>,
}

/// Body of `/api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub stream: bool,
    pub options: GenerationOptions,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl GenerateRequest {
    pub fn new(model: &str, prompt: &str, temperature: f32, json: bool) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerationOptions { temperature },
            format: json.then_some("json"),
        }
    }
}

impl ChatRequest {
    pub fn new(model: &str, prompt: &str, images: Vec<String>, temperature: f32, json: bool) -> Self {
        Self {
            model: model.to_string(),
            stream: false,
            options: GenerationOptions { temperature },
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
                images,
            }],
            format: json.then_some("json"),
        }
    }
}

/// Pull `response` out of a `/api/generate` body
pub fn parse_generate_response(body: &str) -> Result<String> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    parsed.response.ok_or_else(|| {
        DocsortError::MalformedOutput("Response is missing the 'response' field".to_string())
    })
}

/// Pull `message.content` out of a `/api/chat` body
pub fn parse_chat_response(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| {
            DocsortError::MalformedOutput(
                "Response is missing the 'message.content' field".to_string(),
            )
        })
}

fn parse_json_content(content: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Object(map) => Ok(map),
        other => Err(DocsortError::MalformedOutput(format!(
            "Expected a JSON object, got: {}",
            other
        ))),
    }
}

/// Read and base64-encode image files for a chat request
pub fn encode_images(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            std::fs::read(path)
                .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
                .map_err(|e| DocsortError::extraction(path, format!("Failed to read image: {}", e)))
        })
        .collect()
}

/// Client bound to one model on one completion service
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    model: String,
}

impl CompletionClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: completion_client().clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Plain text completion
    pub async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = GenerateRequest::new(&self.model, prompt, temperature, false);
        let body = self.execute(GENERATE_ENDPOINT, &request).await?;
        parse_generate_response(&body)
    }

    /// Completion constrained to a JSON object
    pub async fn generate_json(&self, prompt: &str, temperature: f32) -> Result<Map<String, Value>> {
        let request = GenerateRequest::new(&self.model, prompt, temperature, true);
        let body = self.execute(GENERATE_ENDPOINT, &request).await?;
        parse_json_content(&parse_generate_response(&body)?)
    }

    /// Text completion over one or more images
    pub async fn generate_with_images(
        &self,
        prompt: &str,
        images: &[PathBuf],
        temperature: f32,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model, prompt, encode_images(images)?, temperature, false);
        let body = self.execute(CHAT_ENDPOINT, &request).await?;
        parse_chat_response(&body)
    }

    /// JSON-constrained completion over one or more images
    pub async fn generate_json_with_images(
        &self,
        prompt: &str,
        images: &[PathBuf],
        temperature: f32,
    ) -> Result<Map<String, Value>> {
        let request = ChatRequest::new(&self.model, prompt, encode_images(images)?, temperature, true);
        let body = self.execute(CHAT_ENDPOINT, &request).await?;
        parse_json_content(&parse_chat_response(&body)?)
    }

    /// Convenience for a single image
    pub async fn describe_image(&self, prompt: &str, image: &Path, temperature: f32) -> Result<String> {
        self.generate_with_images(prompt, &[image.to_path_buf()], temperature)
            .await
    }

    async fn execute<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<String> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("[CompletionClient] POST {} (model {})", url, self.model);

        let response = self.client.post(&url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocsortError::Service(format!(
                "Request to {} failed ({}): {}",
                url, status, text
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl TextCompletion for CompletionClient {
    async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.generate(prompt, temperature).await
    }
}
