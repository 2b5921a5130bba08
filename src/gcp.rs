//! OAuth access tokens for the Secret Manager REST call.
//!
//! Object storage authenticates through `object_store`'s own credential
//! chain; only the API key lookup needs a bearer token from here.
//!
//! On Cloud Run / GCE the metadata server hands out tokens for the attached
//! service account. Locally a token can be supplied up front
//! (e.g. `gcloud auth print-access-token`).

use serde::Deserialize;

use crate::error::{truncate_for_log, AuthError};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Fixed bearer token.
    Static(String),
    /// Fetched from the instance metadata server on every call.
    Metadata { client: reqwest::Client },
}

impl TokenSource {
    pub fn new(access_token: Option<String>, client: reqwest::Client) -> Self {
        match access_token {
            Some(token) => Self::Static(token),
            None => Self::Metadata { client },
        }
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata { client } => {
                let response = client
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|err| AuthError(format!("metadata server unreachable: {err}")))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AuthError(format!(
                        "metadata server returned {status}: {}",
                        truncate_for_log(&body, 200)
                    )));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|err| AuthError(format!("bad metadata token response: {err}")))?;
                Ok(token.access_token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let source = TokenSource::new(Some("ya29.token".into()), reqwest::Client::new());
        assert_eq!(source.access_token().await.unwrap(), "ya29.token");
    }

    #[test]
    fn no_token_means_metadata_server() {
        let source = TokenSource::new(None, reqwest::Client::new());
        assert!(matches!(source, TokenSource::Metadata { .. }));
    }
}
