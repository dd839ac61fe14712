use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::model::Tracker;
use crate::remote::{RemoteError, RemoteTable, SaveFailure};

/// In-process remote table with switchable failures.
#[derive(Default)]
pub struct MemoryTable {
    rows: Mutex<HashMap<String, Vec<Tracker>>>,
    fail_fetch: AtomicBool,
    fail_delete: AtomicBool,
    save_failure: Mutex<Option<SaveFailure>>,
    fetches: AtomicUsize,
    upserts: AtomicUsize,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, owner_id: &str, records: Vec<Tracker>) {
        self.rows_mut().insert(owner_id.to_string(), records);
    }

    pub fn records(&self, owner_id: &str) -> Vec<Tracker> {
        self.rows_mut().get(owner_id).cloned().unwrap_or_default()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_save_failure(&self, failure: Option<SaveFailure>) {
        match self.save_failure.lock() {
            Ok(mut guard) => *guard = failure,
            Err(poisoned) => *poisoned.into_inner() = failure,
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of upserts that reached the table, failed ones included.
    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn rows_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Tracker>>> {
        match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn save_failure(&self) -> Option<SaveFailure> {
        match self.save_failure.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    async fn fetch_all(&self, owner_id: &str) -> Result<Vec<Tracker>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Fetch("connection reset".into()));
        }
        Ok(self.records(owner_id))
    }

    async fn upsert_many(&self, owner_id: &str, records: &[Tracker]) -> Result<(), RemoteError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.save_failure() {
            return Err(RemoteError::Save(failure));
        }
        let mut rows = self.rows_mut();
        let owned = rows.entry(owner_id.to_string()).or_default();
        for record in records {
            match owned.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => owned.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn delete_one(&self, id: &str, owner_id: &str) -> Result<(), RemoteError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(RemoteError::Delete("connection reset".into()));
        }
        if let Some(owned) = self.rows_mut().get_mut(owner_id) {
            owned.retain(|r| r.id != id);
        }
        Ok(())
    }
}
