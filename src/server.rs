//! HTTP surface: gallery page, upload, and raw file access.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::caption::CaptionGenerator;
use crate::config::{AppConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::{SecretError, StoreError};
use crate::gallery;
use crate::render;
use crate::store::{caption_key, detect_content_type, ObjectGateway, OCTET_STREAM};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "form_file";

#[derive(Clone)]
pub struct AppState {
    pub store: ObjectGateway,
    pub captioner: Arc<CaptionGenerator>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: ObjectGateway, captioner: Arc<CaptionGenerator>) -> Self {
        Self {
            store,
            captioner,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

pub async fn serve(config: &AppConfig, state: AppState) -> Result<()> {
    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "caption gallery listening");
    axum::serve(listener, app)
        .await
        .context("HTTP server exited")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/files/:filename", get(get_file))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let entries = gallery::list_entries(&state.store).await?;
    Ok(Html(render::gallery_page(&entries)))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read upload: {err}")))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload
        .ok_or_else(|| ApiError::bad_request(format!("missing '{UPLOAD_FIELD}' file field")))?;
    let key = sanitize_filename(&filename)
        .ok_or_else(|| ApiError::bad_request(format!("unusable filename {filename:?}")))?;
    if key != filename {
        warn!(original = %filename, %key, "upload filename sanitised");
    }

    let outcome = state.captioner.generate(&bytes).await?;
    if outcome.is_degraded() {
        warn!(%key, "storing fallback caption");
    }
    let record = outcome.into_record();

    let content_type = detect_content_type(&bytes);
    let size = bytes.len();
    state
        .store
        .put_blob(&key, bytes.to_vec(), content_type)
        .await?;

    let json_key = caption_key(&key);
    if let Err(err) = state.store.put_json(&json_key, &record).await {
        error!(image = %key, caption = %json_key, error = %err, "caption write failed; image stored without caption");
        return Err(err.into());
    }

    info!(%key, size, content_type = content_type.unwrap_or("unknown"), "image uploaded");
    Ok(Redirect::to("/"))
}

async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let object = state.store.get_blob(&filename).await?;

    let content_type = object
        .content_type
        .filter(|value| !value.is_empty() && value != OCTET_STREAM)
        .or_else(|| detect_content_type(&object.bytes).map(str::to_owned))
        .unwrap_or_else(|| OCTET_STREAM.to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], object.bytes).into_response())
}

/// Turn an untrusted upload filename into a flat storage key.
///
/// Only the last path component is kept, characters outside
/// `[A-Za-z0-9._-]` become `_`, and leading dots are dropped.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("{key} not found"))
            }
            StoreError::InvalidKey(key) => {
                ApiError::bad_request(format!("invalid file name {key:?}"))
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<SecretError> for ApiError {
    fn from(err: SecretError) -> Self {
        ApiError::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "request failed");
        } else {
            warn!(status = %self.status, message = %self.message, "request rejected");
        }
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_names_are_unchanged() {
        assert_eq!(sanitize_filename("cat.jpg").as_deref(), Some("cat.jpg"));
        assert_eq!(
            sanitize_filename("IMG_2024-01-01.PNG").as_deref(),
            Some("IMG_2024-01-01.PNG")
        );
    }

    #[test]
    fn path_components_are_dropped() {
        assert_eq!(
            sanitize_filename("../../etc/passwd.jpg").as_deref(),
            Some("passwd.jpg")
        );
        assert_eq!(
            sanitize_filename(r"C:\Users\me\dog.png").as_deref(),
            Some("dog.png")
        );
    }

    #[test]
    fn odd_characters_are_replaced() {
        assert_eq!(
            sanitize_filename("my cat (1).jpg").as_deref(),
            Some("my_cat__1_.jpg")
        );
        assert_eq!(sanitize_filename(".env").as_deref(), Some("env"));
    }

    #[test]
    fn empty_names_are_rejected() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("uploads/"), None);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::from(StoreError::NotFound("missing.jpg".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn secret_failure_maps_to_500() {
        let err = ApiError::from(SecretError::unavailable("GEMINI_API_KEY", "down"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
