//! Persistence of share content.
//!
//! The store writes inside a session owned by the caller. It never commits:
//! an `Err` means the caller must roll the session back.

use chrono::Utc;
use sharebin_core::validation::{sanitize_filename, sanitize_text};
use sharebin_core::{AppError, ShareItem, ShareKind};
use sharebin_db::ShareSession;
use sharebin_storage::{Storage, StorageError};
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Attempts at finding a free artifact name when concurrent uploads race.
const MAX_NAME_ATTEMPTS: usize = 16;

#[derive(Clone)]
pub struct ContentStore {
    storage: Arc<dyn Storage>,
}

impl ContentStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Record a file share and stream its bytes into a fresh artifact.
    ///
    /// The record is inserted before the artifact is written; it stays
    /// invisible to readers until the caller commits.
    #[tracing::instrument(skip(self, session, reader), fields(short_code = %short_code))]
    pub async fn store_file(
        &self,
        session: &mut dyn ShareSession,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        declared_name: &str,
        short_code: &str,
        ttl_secs: u64,
        owner: Option<Uuid>,
    ) -> Result<ShareItem, AppError> {
        let sanitized = sanitize_filename(declared_name);

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.storage.available_name(&sanitized).await?;
            let item = ShareItem::new(short_code, ShareKind::File, &name, ttl_secs, owner, Utc::now());
            session.insert(&item).await?;

            match self.storage.write_new(&name, reader).await {
                Ok(size_bytes) => {
                    tracing::debug!(stored_name = %name, size_bytes, "Stored file artifact");
                    return Ok(item);
                }
                Err(StorageError::AlreadyExists(_)) => {
                    tracing::debug!(stored_name = %name, "Artifact name taken concurrently, retrying");
                    session.delete_by_id(item.id).await?;
                }
                Err(e) => {
                    tracing::error!(error = %e, stored_name = %name, "Failed to write file artifact");
                    return Err(e.into());
                }
            }
        }

        Err(AppError::Storage(format!(
            "No free artifact name found for '{}'",
            sanitized
        )))
    }

    /// Record a text share. Returns the record holding the sanitized text.
    pub async fn store_text(
        &self,
        session: &mut dyn ShareSession,
        text: &str,
        short_code: &str,
        ttl_secs: u64,
        owner: Option<Uuid>,
    ) -> Result<ShareItem, AppError> {
        let item = ShareItem::new(
            short_code,
            ShareKind::Text,
            sanitize_text(text),
            ttl_secs,
            owner,
            Utc::now(),
        );
        session.insert(&item).await?;
        Ok(item)
    }

    /// Record a URL share verbatim. The URL must already be validated.
    pub async fn store_url(
        &self,
        session: &mut dyn ShareSession,
        destination: &str,
        short_code: &str,
        ttl_secs: u64,
        owner: Option<Uuid>,
    ) -> Result<ShareItem, AppError> {
        let item = ShareItem::new(short_code, ShareKind::Url, destination, ttl_secs, owner, Utc::now());
        session.insert(&item).await?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharebin_db::{MemoryShareRepository, ShareRepository};
    use sharebin_storage::LocalStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_file_dedupes_names() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let store = ContentStore::new(storage.clone());
        let repo = MemoryShareRepository::new();

        let mut session = repo.begin().await.unwrap();
        let first = store
            .store_file(session.as_mut(), &mut &b"one"[..], "My Photo.PNG", "code01", 60, None)
            .await
            .unwrap();
        let second = store
            .store_file(session.as_mut(), &mut &b"two"[..], "my photo.png", "code02", 60, None)
            .await
            .unwrap();
        session.commit().await.unwrap();

        assert_eq!(first.content, "my-photo.png");
        assert_eq!(second.content, "my-photo_1.png");
        assert!(storage.exists("my-photo_1.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_text_sanitizes() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(Arc::new(LocalStorage::new(dir.path()).await.unwrap()));
        let repo = MemoryShareRepository::new();

        let mut session = repo.begin().await.unwrap();
        let item = store
            .store_text(session.as_mut(), " <b>\0bold</b> ", "txt001", 60, None)
            .await
            .unwrap();
        assert_eq!(item.content, "&lt;b&gt;bold&lt;/b&gt;");
        assert_eq!(item.kind, ShareKind::Text);
    }
}
