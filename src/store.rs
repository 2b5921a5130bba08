//! Object store gateway.
//!
//! Images are stored under their (sanitised) upload filename and captions
//! under the same base name with a `.json` extension. The pairing is purely
//! by name; nothing ties the two writes together.

use std::path::Path;
use std::sync::Arc;

use futures::TryStreamExt;
use image::ImageFormat;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";

const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Bytes plus whatever content type the backend knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Key/value view of a bucket with the few operations the gallery needs.
#[derive(Clone)]
pub struct ObjectGateway {
    store: Arc<dyn ObjectStore>,
    backend: &'static str,
    /// Whether the backend keeps object attributes such as content type.
    attributes: bool,
}

impl ObjectGateway {
    pub fn new(store: Arc<dyn ObjectStore>, backend: &'static str) -> Self {
        Self {
            store,
            backend,
            attributes: true,
        }
    }

    /// Google Cloud Storage bucket; credentials come from the usual
    /// `GOOGLE_*` variables or the instance metadata server.
    pub fn gcs(bucket: &str) -> Result<Self, StoreError> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Self::new(Arc::new(store), "gcs"))
    }

    /// Directory on disk. The filesystem keeps no content types.
    pub fn local(root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self {
            attributes: false,
            ..Self::new(Arc::new(store), "local")
        })
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    pub fn backend(&self) -> &str {
        self.backend
    }

    /// Write `bytes` under `key`, replacing any existing object.
    pub async fn put_blob(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let location = location(key)?;
        let size = bytes.len();

        let mut attributes = Attributes::new();
        if let (true, Some(content_type)) = (self.attributes, content_type) {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await?;
        debug!(backend = self.backend, key, size, "object written");
        Ok(())
    }

    /// Write `value` as 4-space indented JSON, fields in declaration order.
    pub async fn put_json<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let body = to_indented_json(value)?;
        self.put_blob(key, body, Some(JSON_CONTENT_TYPE)).await
    }

    /// Every key in the bucket, in no particular order.
    pub async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let keys: Vec<String> = self
            .store
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        Ok(keys)
    }

    pub async fn list_image_keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = self.list_keys().await?;
        Ok(keys.into_iter().filter(|key| is_image_key(key)).collect())
    }

    pub async fn get_blob(&self, key: &str) -> Result<StoredObject, StoreError> {
        let location = location(key)?;
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| AsRef::<str>::as_ref(value).to_string());
        let bytes = result.bytes().await?.to_vec();

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    pub async fn get_json(&self, key: &str) -> Result<Value, StoreError> {
        let object = self.get_blob(key).await?;
        Ok(serde_json::from_slice(&object.bytes)?)
    }
}

fn location(key: &str) -> Result<ObjPath, StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    ObjPath::parse(key).map_err(|_| StoreError::InvalidKey(key.to_string()))
}

/// True for keys ending in `.jpg`, `.jpeg` or `.png`, any case.
pub fn is_image_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Sibling caption key: the extension of the last path component swapped
/// for `.json`. Leading dots of a name do not count as an extension.
pub fn caption_key(image_key: &str) -> String {
    let base_start = image_key.rfind('/').map(|i| i + 1).unwrap_or(0);
    let base = &image_key[base_start..];
    let stem = match base.rfind('.') {
        Some(dot) if base[..dot].chars().any(|c| c != '.') => &image_key[..base_start + dot],
        _ => image_key,
    };
    format!("{stem}.json")
}

pub fn to_indented_json<T>(value: &T) -> Result<Vec<u8>, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Sniff an image MIME type from magic bytes.
pub fn detect_content_type(bytes: &[u8]) -> Option<&'static str> {
    let mime = match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Avif => "image/avif",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::CaptionRecord;
    use serde_json::json;
    use tempfile::TempDir;

    const PNG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn image_keys_match_on_suffix_case_insensitively() {
        assert!(is_image_key("cat.jpg"));
        assert!(is_image_key("CAT.JPEG"));
        assert!(is_image_key("shot.Png"));
        assert!(!is_image_key("cat.json"));
        assert!(!is_image_key("cat.gif"));
        assert!(!is_image_key("jpg"));
    }

    #[test]
    fn caption_key_replaces_extension() {
        assert_eq!(caption_key("cat.jpg"), "cat.json");
        assert_eq!(caption_key("a.b.png"), "a.b.json");
        assert_eq!(caption_key("noext"), "noext.json");
        assert_eq!(caption_key(".hidden"), ".hidden.json");
        assert_eq!(caption_key("dir.v2/photo"), "dir.v2/photo.json");
        assert_eq!(caption_key("dir/photo.jpeg"), "dir/photo.json");
    }

    #[test]
    fn json_uses_four_space_indent() {
        let body = to_indented_json(&json!({"title": "A cat"})).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\n    \"title\": \"A cat\"\n}"
        );
    }

    #[test]
    fn caption_json_keeps_title_first() {
        let body = to_indented_json(&CaptionRecord::new("A cat", "A small cat sits.")).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\n    \"title\": \"A cat\",\n    \"description\": \"A small cat sits.\"\n}"
        );
    }

    #[test]
    fn detects_common_formats() {
        assert_eq!(
            detect_content_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]),
            Some("image/jpeg")
        );
        assert_eq!(detect_content_type(&PNG), Some("image/png"));
        assert_eq!(detect_content_type(b"hello world"), None);
    }

    #[tokio::test]
    async fn put_overwrites_and_keeps_content_type() {
        let store = ObjectGateway::in_memory();
        store.put_blob("a.png", vec![1], None).await.unwrap();
        store
            .put_blob("a.png", vec![2, 3], Some("image/png"))
            .await
            .unwrap();

        let object = store.get_blob("a.png").await.unwrap();
        assert_eq!(object.bytes, vec![2, 3]);
        assert_eq!(object.content_type.as_deref(), Some("image/png"));
        assert_eq!(store.list_keys().await.unwrap(), vec!["a.png"]);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = ObjectGateway::in_memory();
        assert!(matches!(
            store.get_blob("nope.jpg").await,
            Err(StoreError::NotFound(key)) if key == "nope.jpg"
        ));
    }

    #[tokio::test]
    async fn path_like_keys_are_invalid() {
        let store = ObjectGateway::in_memory();
        for key in ["", "../escape.jpg", "a//b.jpg"] {
            assert!(matches!(
                store.put_blob(key, vec![0], None).await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn json_round_trips_with_content_type() {
        let store = ObjectGateway::in_memory();
        let value = json!({"title": "T", "description": "D"});
        store.put_json("x.json", &value).await.unwrap();

        assert_eq!(store.get_json("x.json").await.unwrap(), value);
        let raw = store.get_blob("x.json").await.unwrap();
        assert_eq!(raw.content_type.as_deref(), Some("application/json"));
        assert!(String::from_utf8(raw.bytes).unwrap().contains("\n    \"title\""));
    }

    #[tokio::test]
    async fn unparsable_json_is_an_error() {
        let store = ObjectGateway::in_memory();
        store.put_blob("bad.json", b"{nope".to_vec(), None).await.unwrap();
        assert!(matches!(
            store.get_json("bad.json").await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn lists_only_images() {
        let store = ObjectGateway::in_memory();
        for key in ["a.jpg", "a.json", "b.PNG", "notes.txt"] {
            store.put_blob(key, vec![0], None).await.unwrap();
        }
        let mut keys = store.list_image_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a.jpg", "b.PNG"]);
    }

    #[tokio::test]
    async fn local_backend_writes_files() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path().join("files");
        let store = ObjectGateway::local(&root).unwrap();

        store
            .put_blob("dup.png", PNG.to_vec(), Some("image/png"))
            .await
            .unwrap();
        store
            .put_json("dup.json", &json!({"title": "t"}))
            .await
            .unwrap();

        assert!(root.join("dup.png").exists());
        let object = store.get_blob("dup.png").await.unwrap();
        assert_eq!(object.bytes, PNG.to_vec());
        assert_eq!(object.content_type, None);
        assert_eq!(store.list_image_keys().await.unwrap(), vec!["dup.png"]);
        assert!(matches!(
            store.get_blob("missing.jpg").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
