//! In-process share repository
//!
//! Mirrors the Postgres semantics that matter to callers: short codes are
//! unique across committed records and open sessions, session writes stay
//! invisible until commit, and dropping a session discards them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sharebin_core::{AppError, ShareItem};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::share::{ShareRepository, ShareSession};

#[derive(Default)]
struct MemoryState {
    items: HashMap<Uuid, ShareItem>,
    codes: HashMap<String, Uuid>,
    /// Codes inserted by sessions that have not committed yet.
    pending_codes: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryShareRepository {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryShareRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        lock(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of committed records.
    pub fn all(&self) -> Vec<ShareItem> {
        lock(&self.state).items.values().cloned().collect()
    }
}

pub struct MemoryShareSession {
    state: Arc<Mutex<MemoryState>>,
    inserted: Vec<ShareItem>,
    deleted: HashSet<Uuid>,
}

impl MemoryShareSession {
    fn release_pending(&mut self) {
        if self.inserted.is_empty() {
            return;
        }
        let mut state = lock(&self.state);
        for item in self.inserted.drain(..) {
            state.pending_codes.remove(&item.short_code);
        }
    }
}

impl Drop for MemoryShareSession {
    fn drop(&mut self) {
        self.release_pending();
    }
}

#[async_trait]
impl ShareRepository for MemoryShareRepository {
    async fn begin(&self) -> Result<Box<dyn ShareSession>, AppError> {
        Ok(Box::new(MemoryShareSession {
            state: Arc::clone(&self.state),
            inserted: Vec::new(),
            deleted: HashSet::new(),
        }))
    }

    async fn get_by_code(&self, short_code: &str) -> Result<Option<ShareItem>, AppError> {
        let state = lock(&self.state);
        Ok(state
            .codes
            .get(short_code)
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    async fn clear_owner(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut state = lock(&self.state);
        let mut cleared = 0;
        for item in state.items.values_mut() {
            if item.user_id == Some(user_id) {
                item.user_id = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl ShareSession for MemoryShareSession {
    async fn insert(&mut self, item: &ShareItem) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        let committed_owner = state.codes.get(&item.short_code).copied();
        let taken = match committed_owner {
            // A code freed by this session's own pending delete is still taken
            // until commit, matching a unique index.
            Some(_) => true,
            None => state.pending_codes.contains(&item.short_code),
        };
        if taken {
            return Err(AppError::CodeInUse(format!(
                "Short code '{}' already in use",
                item.short_code
            )));
        }
        state.pending_codes.insert(item.short_code.clone());
        drop(state);
        self.inserted.push(item.clone());
        Ok(())
    }

    async fn get_by_code(&mut self, short_code: &str) -> Result<Option<ShareItem>, AppError> {
        if let Some(item) = self.inserted.iter().find(|i| i.short_code == short_code) {
            return Ok(Some(item.clone()));
        }
        let state = lock(&self.state);
        Ok(state
            .codes
            .get(short_code)
            .filter(|id| !self.deleted.contains(*id))
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    async fn delete_by_id(&mut self, id: Uuid) -> Result<bool, AppError> {
        if let Some(pos) = self.inserted.iter().position(|i| i.id == id) {
            let item = self.inserted.remove(pos);
            lock(&self.state).pending_codes.remove(&item.short_code);
            return Ok(true);
        }
        if self.deleted.contains(&id) {
            return Ok(false);
        }
        let exists = lock(&self.state).items.contains_key(&id);
        if exists {
            self.deleted.insert(id);
        }
        Ok(exists)
    }

    async fn find_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<ShareItem>, AppError> {
        let state = lock(&self.state);
        let mut expired: Vec<ShareItem> = state
            .items
            .values()
            .filter(|item| item.expires_at < now && !self.deleted.contains(&item.id))
            .cloned()
            .collect();
        expired.sort_by_key(|item| item.expires_at);
        Ok(expired)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut session = self;
        let inserted = std::mem::take(&mut session.inserted);
        let deleted = std::mem::take(&mut session.deleted);
        let mut state = lock(&session.state);
        for id in deleted {
            if let Some(item) = state.items.remove(&id) {
                state.codes.remove(&item.short_code);
            }
        }
        for item in inserted {
            state.pending_codes.remove(&item.short_code);
            state.codes.insert(item.short_code.clone(), item.id);
            state.items.insert(item.id, item);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let mut session = self;
        session.release_pending();
        session.deleted.clear();
        Ok(())
    }
}
