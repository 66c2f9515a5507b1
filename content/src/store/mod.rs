//! Blob storage for generated images and their metadata.
//!
//! [`ContentStore`] is the seam between the pipeline and object storage.
//! Two implementations ship with the crate:
//!
//! | Store | Use |
//! |---|---|
//! | [`S3ContentStore`] | Production. Any S3-compatible endpoint, SigV4-signed. |
//! | [`MemoryContentStore`] | Tests and local dry runs. |
//!
//! Keys follow the scheme in [`crate::keys`].

mod memory;
mod s3;
pub mod sigv4;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryContentStore, StoredObject};
pub use s3::{S3Config, S3ContentStore};
pub use sigv4::Credentials;

/// Cache directive for objects that never change once written for a date.
pub const DAY_CACHE_CONTROL: &str = "public, max-age=86400";
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("store request for {key} failed: {message}")]
    Request { key: String, message: String },
    #[error("store returned HTTP {status} for {key}: {body}")]
    Status {
        key: String,
        status: u16,
        body: String,
    },
    #[error("store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Object storage operations the pipeline needs.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short name for logging (`"s3"`, `"memory"`).
    fn name(&self) -> &'static str;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Read an object. Missing objects yield [`StoreError::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write (or overwrite) an object.
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StoreError>;

    /// Credential-free URL that grants read access to `key` for exactly `ttl`.
    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;
}
