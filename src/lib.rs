//! Image gallery that captions uploads with Gemini and keeps both the image
//! and its caption in an object store.

pub mod caption;
pub mod config;
pub mod error;
pub mod gallery;
pub mod gcp;
pub mod logging;
pub mod render;
pub mod secrets;
pub mod server;
pub mod store;
