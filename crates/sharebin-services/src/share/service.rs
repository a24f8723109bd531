use chrono::Utc;
use sharebin_core::shortcode::{is_reserved, validate_custom_code};
use sharebin_core::validation::is_valid_url;
use sharebin_core::{
    AppError, CodeGenerator, Config, PlanTier, QuotaKind, QuotaTable, RandomCodeGenerator,
    ShareItem, ShareKind,
};
use sharebin_db::{ShareRepository, ShareSession};
use sharebin_storage::{ByteStream, Storage};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

use super::retrieval::{describe, ShareDescriptor};
use super::store::ContentStore;

const CODE_IN_USE: &str = "Custom code already in use";
const INVALID_LINK: &str = "Invalid link";

/// Who is uploading. Resolved by the auth layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<Uuid>,
    pub tier: PlanTier,
}

impl Requester {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid, tier: PlanTier) -> Self {
        Self {
            user_id: Some(user_id),
            tier,
        }
    }
}

pub enum UploadContent {
    File {
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        filename: String,
        /// Declared size in bytes. `None` is rejected.
        size: Option<u64>,
    },
    Text(String),
    Url(String),
}

impl std::fmt::Debug for UploadContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadContent::File { filename, size, .. } => f
                .debug_struct("File")
                .field("filename", filename)
                .field("size", size)
                .finish_non_exhaustive(),
            UploadContent::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            UploadContent::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

#[derive(Debug)]
pub struct UploadRequest {
    pub content: UploadContent,
    pub custom_code: Option<String>,
    /// Requested lifetime in hours. `None` means the tier maximum.
    pub expiry_hours: Option<f64>,
    pub requester: Requester,
}

impl UploadRequest {
    pub fn new(content: UploadContent, requester: Requester) -> Self {
        Self {
            content,
            custom_code: None,
            expiry_hours: None,
            requester,
        }
    }

    pub fn with_custom_code(mut self, code: impl Into<String>) -> Self {
        self.custom_code = Some(code.into());
        self
    }

    pub fn with_expiry_hours(mut self, hours: f64) -> Self {
        self.expiry_hours = Some(hours);
        self
    }
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub item: ShareItem,
    /// Effective lifetime after clamping.
    pub ttl_secs: u64,
}

/// Content after validation, ready to persist.
enum Prepared {
    File {
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        filename: String,
    },
    Text(String),
    Url(String),
}

#[derive(Clone)]
pub struct ShareService {
    repository: Arc<dyn ShareRepository>,
    store: ContentStore,
    generator: Arc<dyn CodeGenerator>,
    quotas: QuotaTable,
    strict_read_expiry: bool,
}

impl ShareService {
    pub fn new(config: &Config, repository: Arc<dyn ShareRepository>, storage: Arc<dyn Storage>) -> Self {
        Self {
            repository,
            store: ContentStore::new(storage),
            generator: Arc::new(RandomCodeGenerator),
            quotas: config.quotas.clone(),
            strict_read_expiry: config.strict_read_expiry,
        }
    }

    /// Replace the short-code source.
    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn quotas(&self) -> &QuotaTable {
        &self.quotas
    }

    /// Validate, allocate a short code and persist one share.
    ///
    /// Custom codes are checked once and rejected if taken or reserved.
    /// Generated codes are retried until one is accepted by the store.
    #[tracing::instrument(skip(self, request), fields(tier = %request.requester.tier))]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, AppError> {
        let UploadRequest {
            content,
            custom_code,
            expiry_hours,
            requester,
        } = request;

        let ttl_secs = self.quotas.effective_ttl(requester.tier, expiry_hours)?;
        let mut prepared = self.prepare(content, requester.tier)?;

        let custom_code = match custom_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(validate_custom_code(code)?),
            _ => None,
        };
        if let Some(code) = &custom_code {
            if self.repository.get_by_code(code).await?.is_some() {
                return Err(AppError::CodeInUse(CODE_IN_USE.to_string()));
            }
        }

        loop {
            let short_code = match &custom_code {
                Some(code) => code.clone(),
                None => self.next_candidate_code().await?,
            };

            let mut session = self.repository.begin().await?;
            let result = self
                .persist(session.as_mut(), &mut prepared, &short_code, ttl_secs, requester.user_id)
                .await;

            match result {
                Ok(item) => {
                    if let Err(e) = session.commit().await {
                        if item.kind == ShareKind::File {
                            self.discard_artifact(&item.content).await;
                        }
                        return Err(e);
                    }
                    tracing::info!(
                        short_code = %item.short_code,
                        kind = %item.kind,
                        ttl_secs,
                        expires_at = %item.expires_at,
                        "Share created"
                    );
                    return Ok(UploadOutcome { item, ttl_secs });
                }
                Err(err) => {
                    if let Err(rollback_err) = session.rollback().await {
                        tracing::warn!(error = %rollback_err, "Failed to roll back upload session");
                    }
                    match err {
                        AppError::CodeInUse(_) if custom_code.is_none() => {
                            tracing::debug!(short_code = %short_code, "Generated short code collided, retrying");
                        }
                        AppError::CodeInUse(_) => {
                            return Err(AppError::CodeInUse(CODE_IN_USE.to_string()));
                        }
                        other => return Err(other),
                    }
                }
            }
        }
    }

    /// Look up a short code and describe how to serve it.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, short_code: &str) -> Result<ShareDescriptor, AppError> {
        let item = self
            .repository
            .get_by_code(short_code)
            .await?
            .ok_or_else(|| AppError::NotFound(INVALID_LINK.to_string()))?;

        if self.strict_read_expiry && item.is_expired_at(Utc::now()) {
            tracing::debug!(expires_at = %item.expires_at, "Share expired but not yet reaped");
            return Err(AppError::NotFound(INVALID_LINK.to_string()));
        }

        describe(item, self.store.storage().as_ref())
    }

    /// Open a file artifact for streaming. Returns the stream and its length.
    pub async fn open_file(&self, name: &str) -> Result<(ByteStream, u64), AppError> {
        let storage = self.store.storage();
        let length = storage.content_length(name).await?;
        let stream = storage.download_stream(name).await?;
        Ok((stream, length))
    }

    /// Detach a deleted user from their shares. The shares stay live.
    #[tracing::instrument(skip(self))]
    pub async fn detach_owner(&self, user_id: Uuid) -> Result<u64, AppError> {
        let cleared = self.repository.clear_owner(user_id).await?;
        tracing::info!(user_id = %user_id, cleared, "Detached owner from shares");
        Ok(cleared)
    }

    fn prepare(&self, content: UploadContent, tier: PlanTier) -> Result<Prepared, AppError> {
        match content {
            UploadContent::File {
                reader,
                filename,
                size,
            } => {
                if filename.trim().is_empty() {
                    return Err(AppError::InvalidInput("File name is unknown".to_string()));
                }
                let size = size.ok_or_else(|| {
                    AppError::InvalidInput("File size is unknown".to_string())
                })?;
                let limit = self.quotas.size_limit(QuotaKind::File, tier);
                if size > limit {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File too large. Maximum size for {} users is {} bytes",
                        tier, limit
                    )));
                }
                Ok(Prepared::File { reader, filename })
            }
            UploadContent::Text(text) => {
                let trimmed = text.trim();
                if is_valid_url(trimmed) {
                    return Ok(Prepared::Url(trimmed.to_string()));
                }
                let limit = self.quotas.size_limit(QuotaKind::Text, tier);
                if trimmed.len() as u64 > limit {
                    return Err(AppError::PayloadTooLarge(format!(
                        "Text too large. Maximum size for {} users is {} bytes",
                        tier, limit
                    )));
                }
                if trimmed.replace('\0', "").trim().is_empty() {
                    return Err(AppError::InvalidInput("Text cannot be empty".to_string()));
                }
                Ok(Prepared::Text(text))
            }
            UploadContent::Url(url) => {
                if !is_valid_url(&url) {
                    return Err(AppError::InvalidInput("Invalid URL".to_string()));
                }
                Ok(Prepared::Url(url.trim().to_string()))
            }
        }
    }

    async fn persist(
        &self,
        session: &mut dyn ShareSession,
        prepared: &mut Prepared,
        short_code: &str,
        ttl_secs: u64,
        owner: Option<Uuid>,
    ) -> Result<ShareItem, AppError> {
        match prepared {
            Prepared::File { reader, filename } => {
                self.store
                    .store_file(session, reader.as_mut().get_mut(), filename, short_code, ttl_secs, owner)
                    .await
            }
            Prepared::Text(text) => {
                self.store
                    .store_text(session, text, short_code, ttl_secs, owner)
                    .await
            }
            Prepared::Url(url) => {
                self.store
                    .store_url(session, url, short_code, ttl_secs, owner)
                    .await
            }
        }
    }

    /// A generated code that is neither reserved nor already committed.
    async fn next_candidate_code(&self) -> Result<String, AppError> {
        loop {
            let code = self.generator.generate();
            if is_reserved(&code) {
                continue;
            }
            if self.repository.get_by_code(&code).await?.is_none() {
                return Ok(code);
            }
            tracing::debug!(short_code = %code, "Generated short code already taken");
        }
    }

    async fn discard_artifact(&self, name: &str) {
        if let Err(e) = self.store.storage().delete(name).await {
            tracing::error!(error = %e, stored_name = %name, "Failed to remove artifact of uncommitted share");
        }
    }
}
