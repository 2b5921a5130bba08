//! Error types for the caption gallery.
//!
//! Each collaborator gets its own enum so the HTTP layer can decide which
//! failures are the client's fault, which are "not found", and which are
//! plain server errors.

use thiserror::Error;

/// Configuration could not be read from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable was set but could not be parsed
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Failed to obtain a Google Cloud access token.
#[derive(Error, Debug)]
#[error("access token unavailable: {0}")]
pub struct AuthError(pub String);

/// The API key could not be fetched from the secret backend.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("secret {name} unavailable: {message}")]
    Unavailable { name: String, message: String },
}

impl SecretError {
    pub fn unavailable(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Unavailable {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

/// Errors from the generative model call itself.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Transport-level failure (DNS, TLS, connection reset, ...)
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The API answered 2xx but the envelope was not the expected shape
    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Object store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorten a response body for inclusion in an error or log line.
pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_values() {
        assert_eq!(truncate_for_log("short", 10), "short");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let value = "ééééé";
        assert_eq!(truncate_for_log(value, 2), "éé... (truncated)");
    }
}
