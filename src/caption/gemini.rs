//! Google Gemini `generateContent` client.

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{truncate_for_log, ModelError};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Base64-encoded image ready to inline into a model request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type declared to the model
    pub mime_type: String,
}

impl ImageInput {
    pub fn new(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
        }
    }

    /// The captioning contract always declares JPEG, whatever was uploaded.
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self::new(bytes, "image/jpeg")
    }
}

/// A multimodal model that answers a prompt about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model name for logging.
    fn name(&self) -> &str;

    /// Returns the reply text, or `None` when the model produced no text.
    async fn generate(
        &self,
        api_key: &str,
        image: &ImageInput,
        prompt: &str,
    ) -> Result<Option<String>, ModelError>;
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, model: &str) -> Self {
        Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        api_key: &str,
        image: &ImageInput,
        prompt: &str,
    ) -> Result<Option<String>, ModelError> {
        let payload = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": image.data
                        }
                    },
                    { "text": prompt }
                ]
            }]
        });

        let started = Instant::now();
        // Key travels in a header, never in the URL (reqwest errors print URLs).
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(
            model = %self.model,
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            body = %truncate_for_log(&body, 500),
            "gemini response"
        );

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }

        extract_text(&body)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> Result<Option<String>, ModelError> {
    let response: GeminiResponse = serde_json::from_str(body)?;
    let text: String = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}
