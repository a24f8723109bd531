//! Record store interface for share items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sharebin_core::{AppError, ShareItem};
use uuid::Uuid;

/// Entry point to the record store.
///
/// Reads outside a session see committed state only. Writes always go through
/// a [`ShareSession`] so the caller owns the commit boundary.
#[async_trait]
pub trait ShareRepository: Send + Sync {
    /// Open a new isolated session.
    async fn begin(&self) -> Result<Box<dyn ShareSession>, AppError>;

    async fn get_by_code(&self, short_code: &str) -> Result<Option<ShareItem>, AppError>;

    /// Clear `user_id` on every record owned by `user_id`. Records are kept.
    async fn clear_owner(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), AppError>;
}

/// A transactional session over the record store.
///
/// Dropping a session without committing discards its writes.
#[async_trait]
pub trait ShareSession: Send {
    /// Insert a record. Fails with [`AppError::CodeInUse`] if the short code is
    /// taken, including by another open session.
    async fn insert(&mut self, item: &ShareItem) -> Result<(), AppError>;

    async fn get_by_code(&mut self, short_code: &str) -> Result<Option<ShareItem>, AppError>;

    /// Delete by id. Deleting a missing id is a no-op returning `false`.
    async fn delete_by_id(&mut self, id: Uuid) -> Result<bool, AppError>;

    /// All records with `expires_at < now`.
    async fn find_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<ShareItem>, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
