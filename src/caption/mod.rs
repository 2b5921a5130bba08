//! Title/description generation for uploaded images.
//!
//! The generator never fails because of the model: unusable replies and
//! unreachable APIs both degrade to the fixed fallback record, but the
//! outcome says which of the two happened. Only a missing API key is an
//! error.

pub mod gemini;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{truncate_for_log, SecretError};
use crate::secrets::SecretProvider;

pub use gemini::{GeminiClient, ImageInput, VisionModel};

pub const CAPTION_PROMPT: &str = "Analyze the image and generate a clear title and description.\n\n\
Strictly respond in this JSON format:\n\
{\n  \"title\": \"A short, engaging title\",\n  \"description\": \"2-3 sentences describing the image\"\n}\n\
No extra text, no markdown, no formatting.";

pub const FALLBACK_TITLE: &str = "No title generated";
pub const FALLBACK_DESCRIPTION: &str = "No description generated";

/// `{ title, description }` as stored next to each image.
///
/// Fields the model left out stay absent; the gallery fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CaptionRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_TITLE, FALLBACK_DESCRIPTION)
    }
}

/// Why a caption fell back to placeholder text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// The model call failed (network, auth, quota, 5xx, bad envelope).
    ModelUnavailable(String),
    /// The model answered without any text.
    EmptyResponse,
    /// The model's text was not a `{title, description}` JSON object.
    Malformed(String),
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelUnavailable(message) => write!(f, "model unavailable: {message}"),
            Self::EmptyResponse => f.write_str("model returned no text"),
            Self::Malformed(message) => write!(f, "malformed caption JSON: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Generated(CaptionRecord),
    Degraded(DegradedReason),
}

impl CaptionOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// The record to persist; degraded outcomes yield the fallback.
    pub fn into_record(self) -> CaptionRecord {
        match self {
            Self::Generated(record) => record,
            Self::Degraded(_) => CaptionRecord::fallback(),
        }
    }
}

/// Remove a wrapping ```` ```json ```` / ```` ``` ```` fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json\n")
        .or_else(|| text.strip_prefix("```\n"))
        .unwrap_or(text);
    let text = text.strip_suffix("\n```").unwrap_or(text);
    text.trim()
}

/// Parse the model's reply text into a caption record.
pub fn parse_reply(text: &str) -> Result<CaptionRecord, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}

pub struct CaptionGenerator {
    secrets: Arc<dyn SecretProvider>,
    model: Arc<dyn VisionModel>,
}

impl CaptionGenerator {
    pub fn new(secrets: Arc<dyn SecretProvider>, model: Arc<dyn VisionModel>) -> Self {
        Self { secrets, model }
    }

    /// Ask the model for a caption of `image`.
    ///
    /// The API key is fetched fresh for each call.
    pub async fn generate(&self, image: &[u8]) -> Result<CaptionOutcome, SecretError> {
        let api_key = self.secrets.api_key().await?;
        let input = ImageInput::jpeg(image);

        let reply = match self.model.generate(&api_key, &input, CAPTION_PROMPT).await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => return Ok(self.degrade(DegradedReason::EmptyResponse)),
            Err(err) => {
                return Ok(self.degrade(DegradedReason::ModelUnavailable(err.to_string())));
            }
        };

        match parse_reply(&reply) {
            Ok(record) => {
                info!(model = self.model.name(), "caption generated");
                Ok(CaptionOutcome::Generated(record))
            }
            Err(err) => {
                warn!(reply = %truncate_for_log(&reply, 300), "could not parse caption JSON");
                Ok(self.degrade(DegradedReason::Malformed(err.to_string())))
            }
        }
    }

    fn degrade(&self, reason: DegradedReason) -> CaptionOutcome {
        warn!(model = self.model.name(), %reason, "caption degraded to fallback");
        CaptionOutcome::Degraded(reason)
    }
}
