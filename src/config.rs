//! Runtime configuration read from environment variables.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BUCKET: &str = "cnd_bucket";
pub const DEFAULT_PROJECT_ID: &str = "846599288582";
pub const DEFAULT_SECRET_NAME: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_LOCAL_PATH: &str = "./files";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Where image and caption objects live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Google Cloud Storage bucket
    Gcs,
    /// Directory on local disk
    Local,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gcs" => Ok(Self::Gcs),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown storage backend '{other}' (expected gcs or local)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bucket_name: String,
    pub project_id: String,
    pub secret_name: String,
    /// Inline API key; bypasses Secret Manager when set.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub storage_backend: StorageBackend,
    pub local_storage_path: PathBuf,
    pub access_token: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = parse_var("PORT", var("PORT"), DEFAULT_PORT)?;
        let storage_backend =
            parse_var("STORAGE_BACKEND", var("STORAGE_BACKEND"), StorageBackend::Gcs)?;
        let max_upload_bytes = parse_var(
            "MAX_UPLOAD_BYTES",
            var("MAX_UPLOAD_BYTES"),
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        Ok(Self {
            port,
            bucket_name: var("BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            project_id: var("GCP_PROJECT_ID").unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string()),
            secret_name: var("GEMINI_SECRET_NAME")
                .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string()),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            storage_backend,
            local_storage_path: var("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_PATH)),
            access_token: var("GOOGLE_OAUTH_ACCESS_TOKEN"),
            max_upload_bytes,
        })
    }

    /// All interfaces, configured port.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn parse_var<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match raw {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|err| ConfigError::Invalid {
                var: name,
                reason: err.to_string(),
                value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bucket_name, "cnd_bucket");
        assert_eq!(config.storage_backend, StorageBackend::Gcs);
        assert_eq!(config.gemini_model, "gemini-1.5-flash");
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("STORAGE_BACKEND", "Local"),
            ("LOCAL_STORAGE_PATH", "/tmp/gallery"),
            ("GEMINI_API_KEY", "abc"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.local_storage_path, PathBuf::from("/tmp/gallery"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "  "), ("GEMINI_API_KEY", "")]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn rejects_bad_port() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(config_from(&[("STORAGE_BACKEND", "s3")]).is_err());
    }
}
