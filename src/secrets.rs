//! Where the Gemini API key comes from.
//!
//! The key is looked up on every call; nothing is cached in process.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::error::{truncate_for_log, SecretError};
use crate::gcp::TokenSource;

const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Current value of the API key.
    async fn api_key(&self) -> Result<String, SecretError>;
}

/// Google Secret Manager, always reading the `latest` version.
pub struct SecretManagerProvider {
    client: reqwest::Client,
    tokens: TokenSource,
    base_url: String,
    resource: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

impl SecretManagerProvider {
    pub fn new(
        client: reqwest::Client,
        tokens: TokenSource,
        project_id: &str,
        secret_id: &str,
    ) -> Self {
        Self {
            client,
            tokens,
            base_url: SECRET_MANAGER_URL.to_string(),
            resource: format!("projects/{project_id}/secrets/{secret_id}/versions/latest"),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn access_url(&self) -> String {
        format!("{}/{}:access", self.base_url, self.resource)
    }

    /// Fully qualified secret version name.
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

#[async_trait]
impl SecretProvider for SecretManagerProvider {
    async fn api_key(&self) -> Result<String, SecretError> {
        let unavailable = |message: String| SecretError::unavailable(&self.resource, message);

        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|err| unavailable(err.to_string()))?;

        let response = self
            .client
            .get(self.access_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "Secret Manager returned {status}: {}",
                truncate_for_log(&body, 200)
            )));
        }

        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|err| unavailable(err.to_string()))?;
        decode_payload(&body.payload.data).map_err(unavailable)
    }
}

fn decode_payload(data: &str) -> Result<String, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|err| format!("payload is not base64: {err}"))?;
    let value = String::from_utf8(bytes).map_err(|err| format!("payload is not UTF-8: {err}"))?;
    Ok(value.trim().to_string())
}

/// Key handed in through configuration (`GEMINI_API_KEY`).
pub struct StaticSecret {
    value: String,
}

impl StaticSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[async_trait]
impl SecretProvider for StaticSecret {
    async fn api_key(&self) -> Result<String, SecretError> {
        if self.value.trim().is_empty() {
            return Err(SecretError::unavailable("GEMINI_API_KEY", "value is empty"));
        }
        Ok(self.value.clone())
    }
}
