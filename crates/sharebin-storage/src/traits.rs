//! Storage abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use sharebin_core::AppError;
use std::path::PathBuf;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// The target name was taken between lookup and write.
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage name: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound("File not found".to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Artifact store keyed by flat filename.
#[async_trait]
pub trait Storage: Send + Sync {
    /// First free name derived from `filename` by appending `_1`, `_2`, ...
    /// before the extension. Advisory only: a concurrent writer can still take
    /// it, which `write_new` reports as `AlreadyExists`.
    async fn available_name(&self, filename: &str) -> StorageResult<String>;

    /// Stream `reader` into a new artifact. Never overwrites. On failure no
    /// partial artifact is left behind. Returns bytes written.
    ///
    /// `AlreadyExists` is reported before anything is read, so the caller can
    /// retry with another name using the same reader.
    async fn write_new(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64>;

    /// Remove an artifact. `Ok(false)` when it was already absent.
    async fn delete(&self, name: &str) -> StorageResult<bool>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    async fn content_length(&self, name: &str) -> StorageResult<u64>;

    /// Stream an artifact's bytes.
    async fn download_stream(&self, name: &str) -> StorageResult<ByteStream>;

    /// Filesystem location of an artifact, for callers that serve it directly.
    fn path_for(&self, name: &str) -> StorageResult<PathBuf>;
}

/// Split `name` into stem and extension (with dot) the way `available_name` does.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
