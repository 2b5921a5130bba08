use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use caption_gallery::caption::{CaptionGenerator, GeminiClient};
use caption_gallery::config::{AppConfig, StorageBackend};
use caption_gallery::gcp::TokenSource;
use caption_gallery::logging;
use caption_gallery::secrets::{SecretManagerProvider, SecretProvider, StaticSecret};
use caption_gallery::server::{self, AppState};
use caption_gallery::store::ObjectGateway;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let http = reqwest::Client::new();
    let tokens = TokenSource::new(config.access_token.clone(), http.clone());

    let secrets: Arc<dyn SecretProvider> = match &config.gemini_api_key {
        Some(key) => Arc::new(StaticSecret::new(key.clone())),
        None => Arc::new(SecretManagerProvider::new(
            http.clone(),
            tokens,
            &config.project_id,
            &config.secret_name,
        )),
    };

    // Fail fast if the key cannot be read at all.
    secrets
        .api_key()
        .await
        .context("Gemini API key lookup failed at startup")?;
    info!(model = %config.gemini_model, "Gemini API key available");

    let store = match config.storage_backend {
        StorageBackend::Gcs => ObjectGateway::gcs(&config.bucket_name),
        StorageBackend::Local => ObjectGateway::local(&config.local_storage_path),
    }
    .context("failed to open object store")?;
    info!(backend = store.backend(), bucket = %config.bucket_name, "object store ready");

    let model = Arc::new(GeminiClient::new(http, &config.gemini_model));
    let captioner = Arc::new(CaptionGenerator::new(secrets, model));
    let state = AppState::new(store, captioner).with_max_upload_bytes(config.max_upload_bytes);

    server::serve(&config, state).await
}
