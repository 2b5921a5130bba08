//! Joins stored images with their caption objects for display.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{caption_key, ObjectGateway};

/// Shown for images whose caption is missing or unreadable.
pub const MISSING_CAPTION: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryEntry {
    pub name: String,
    pub title: String,
    pub description: String,
}

/// All images, newest-looking names first (plain descending string order).
///
/// An image without a readable caption is listed with `N/A` text; a caption
/// without an image is never listed.
pub async fn list_entries(store: &ObjectGateway) -> Result<Vec<GalleryEntry>, StoreError> {
    let keys = store.list_image_keys().await?;
    let mut entries = Vec::with_capacity(keys.len());

    for name in keys {
        let caption_key = caption_key(&name);
        let caption = match store.get_json(&caption_key).await {
            Ok(value) => value,
            Err(err) => {
                debug!(image = %name, caption = %caption_key, error = %err, "no usable caption");
                Value::Null
            }
        };

        entries.push(GalleryEntry {
            title: caption_field(&caption, "title"),
            description: caption_field(&caption, "description"),
            name,
        });
    }

    entries.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(entries)
}

fn caption_field(caption: &Value, field: &str) -> String {
    caption
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or(MISSING_CAPTION)
        .to_string()
}
