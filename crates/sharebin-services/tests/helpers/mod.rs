#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sharebin_core::{AppError, CodeGenerator, Config, ShareItem};
use sharebin_db::{MemoryShareRepository, ShareRepository, ShareSession};
use sharebin_services::{Requester, ShareService, UploadContent, UploadRequest};
use sharebin_storage::{ByteStream, LocalStorage, Storage, StorageError, StorageResult};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::AsyncRead;
use tokio::sync::Barrier;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-that-is-at-least-32-characters";

pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("JWT_SECRET".into(), TEST_SECRET.into());
    vars.insert("DATABASE_URL".into(), "memory://".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub struct Harness {
    pub config: Config,
    pub repo: MemoryShareRepository,
    pub storage: Arc<LocalStorage>,
    pub service: ShareService,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config(&[])).await
    }

    pub async fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let repo = MemoryShareRepository::new();
        let service = ShareService::new(&config, Arc::new(repo.clone()), storage.clone());
        Self {
            config,
            repo,
            storage,
            service,
            _dir: dir,
        }
    }

    pub async fn insert_committed(&self, item: &ShareItem) {
        let mut session = self.repo.begin().await.unwrap();
        session.insert(item).await.unwrap();
        session.commit().await.unwrap();
    }
}

pub fn file_upload(name: &str, data: &'static [u8]) -> UploadRequest {
    UploadRequest::new(
        UploadContent::File {
            reader: Box::pin(data),
            filename: name.to_string(),
            size: Some(data.len() as u64),
        },
        Requester::anonymous(),
    )
}

pub fn text_upload(text: &str) -> UploadRequest {
    UploadRequest::new(UploadContent::Text(text.to_string()), Requester::anonymous())
}

pub fn url_upload(url: &str) -> UploadRequest {
    UploadRequest::new(UploadContent::Url(url.to_string()), Requester::anonymous())
}

/// Hands out a fixed sequence of codes, then falls back to a counter.
pub struct ScriptedGenerator {
    codes: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CodeGenerator for ScriptedGenerator {
    fn generate(&self) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("gen{:03}", n))
    }
}

/// Local storage whose writes or deletes can be made to fail.
pub struct FaultyStorage {
    pub inner: LocalStorage,
    pub fail_writes: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FaultyStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn available_name(&self, filename: &str) -> StorageResult<String> {
        self.inner.available_name(filename).await
    }

    async fn write_new(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("disk full".to_string()));
        }
        self.inner.write_new(name, reader).await
    }

    async fn delete(&self, name: &str) -> StorageResult<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed("permission denied".to_string()));
        }
        self.inner.delete(name).await
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        self.inner.exists(name).await
    }

    async fn content_length(&self, name: &str) -> StorageResult<u64> {
        self.inner.content_length(name).await
    }

    async fn download_stream(&self, name: &str) -> StorageResult<ByteStream> {
        self.inner.download_stream(name).await
    }

    fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        self.inner.path_for(name)
    }
}

/// Memory repository whose session commits can be made to fail, and whose
/// code lookups can be held until a set number of callers arrive.
#[derive(Clone)]
pub struct FlakyRepository {
    pub inner: MemoryShareRepository,
    pub fail_commits: Arc<AtomicBool>,
    lookup_barrier: Option<Arc<Barrier>>,
}

impl FlakyRepository {
    pub fn new(inner: MemoryShareRepository) -> Self {
        Self {
            inner,
            fail_commits: Arc::new(AtomicBool::new(false)),
            lookup_barrier: None,
        }
    }

    /// Every `get_by_code` waits until `callers` lookups are in flight.
    pub fn with_lookup_barrier(mut self, callers: usize) -> Self {
        self.lookup_barrier = Some(Arc::new(Barrier::new(callers)));
        self
    }
}

struct FlakySession {
    inner: Box<dyn ShareSession>,
    fail_commit: bool,
}

#[async_trait]
impl ShareRepository for FlakyRepository {
    async fn begin(&self) -> Result<Box<dyn ShareSession>, AppError> {
        Ok(Box::new(FlakySession {
            inner: self.inner.begin().await?,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }

    async fn get_by_code(&self, short_code: &str) -> Result<Option<ShareItem>, AppError> {
        if let Some(barrier) = &self.lookup_barrier {
            barrier.wait().await;
        }
        self.inner.get_by_code(short_code).await
    }

    async fn clear_owner(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.inner.clear_owner(user_id).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.inner.ping().await
    }
}

#[async_trait]
impl ShareSession for FlakySession {
    async fn insert(&mut self, item: &ShareItem) -> Result<(), AppError> {
        self.inner.insert(item).await
    }

    async fn get_by_code(&mut self, short_code: &str) -> Result<Option<ShareItem>, AppError> {
        self.inner.get_by_code(short_code).await
    }

    async fn delete_by_id(&mut self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete_by_id(id).await
    }

    async fn find_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<ShareItem>, AppError> {
        self.inner.find_expired(now).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        if self.fail_commit {
            self.inner.rollback().await?;
            return Err(AppError::Internal("connection lost during commit".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.inner.rollback().await
    }
}
