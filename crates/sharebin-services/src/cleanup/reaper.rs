use chrono::{DateTime, Utc};
use futures::FutureExt;
use sharebin_core::{AppError, Config, ShareKind};
use sharebin_db::{ShareRepository, ShareSession};
use sharebin_storage::Storage;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Counts from one reaper run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub expired: usize,
    pub records_deleted: usize,
    pub artifacts_deleted: usize,
    pub artifacts_missing: usize,
    pub artifact_failures: usize,
}

/// Periodically deletes expired shares and their artifacts.
///
/// Each run works in its own session and commits all deletions at once. A
/// failed run is rolled back and logged; the schedule keeps going.
#[derive(Clone)]
pub struct ExpiryReaper {
    repository: Arc<dyn ShareRepository>,
    storage: Arc<dyn Storage>,
    interval: Duration,
}

impl ExpiryReaper {
    pub fn new(
        repository: Arc<dyn ShareRepository>,
        storage: Arc<dyn Storage>,
        interval: Duration,
    ) -> Self {
        Self {
            repository,
            storage,
            interval,
        }
    }

    pub fn from_config(
        config: &Config,
        repository: Arc<dyn ShareRepository>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self::new(
            repository,
            storage,
            Duration::from_secs(config.cleanup_interval_secs),
        )
    }

    /// Start the background task. Runs once immediately, then every interval,
    /// until `cancel` fires. Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(interval_secs = self.interval.as_secs(), "Expiry reaper started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Expiry reaper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_guarded().await;
                    }
                }
            }
        })
    }

    /// One run that never lets an error or panic escape.
    async fn run_guarded(&self) {
        match AssertUnwindSafe(self.run_once()).catch_unwind().await {
            Ok(Ok(report)) if report.expired > 0 => {
                tracing::info!(
                    expired = report.expired,
                    records_deleted = report.records_deleted,
                    artifacts_deleted = report.artifacts_deleted,
                    artifacts_missing = report.artifacts_missing,
                    artifact_failures = report.artifact_failures,
                    "Expiry reaper run completed"
                );
            }
            Ok(Ok(_)) => {
                tracing::debug!("Expiry reaper run found nothing to delete");
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e.detailed_message(), "Expiry reaper run failed");
            }
            Err(_) => {
                tracing::error!("Expiry reaper run panicked");
            }
        }
    }

    pub async fn run_once(&self) -> Result<ReapReport, AppError> {
        self.run_once_at(Utc::now()).await
    }

    /// Reap everything with `expires_at < now`.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_shares"))]
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<ReapReport, AppError> {
        let mut session = self.repository.begin().await?;

        match self.reap(session.as_mut(), now).await {
            Ok(report) => {
                session.commit().await?;
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back reaper session");
                }
                Err(e)
            }
        }
    }

    async fn reap(
        &self,
        session: &mut dyn ShareSession,
        now: DateTime<Utc>,
    ) -> Result<ReapReport, AppError> {
        let expired = session.find_expired(now).await?;
        let mut report = ReapReport {
            expired: expired.len(),
            ..Default::default()
        };

        for item in expired {
            tracing::debug!(
                share_id = %item.id,
                short_code = %item.short_code,
                kind = %item.kind,
                expires_at = %item.expires_at,
                "Deleting expired share"
            );

            // Artifact first; the record goes regardless.
            if item.kind == ShareKind::File {
                match self.storage.delete(&item.content).await {
                    Ok(true) => report.artifacts_deleted += 1,
                    Ok(false) => {
                        tracing::warn!(stored_name = %item.content, "Artifact already absent");
                        report.artifacts_missing += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            stored_name = %item.content,
                            "Failed to delete artifact, continuing with record deletion"
                        );
                        report.artifact_failures += 1;
                    }
                }
            }

            if session.delete_by_id(item.id).await? {
                report.records_deleted += 1;
            }
        }

        Ok(report)
    }
}
