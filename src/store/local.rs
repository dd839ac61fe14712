use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::model::Tracker;
use crate::store::kv::KeyValueStore;

/// Storage key of the tracker list.
pub const TRACKERS_KEY: &str = "stride-trackers";

/// Default coalescing window for physical writes.
pub const DEFAULT_WRITE_WINDOW: Duration = Duration::from_millis(300);

/// Mirrors one typed value under one key of a [`KeyValueStore`].
///
/// Reads are served from memory. Writes update memory immediately and are
/// coalesced into a single physical write per window, last value wins.
/// Storage and parse failures are logged and never reach the caller; a
/// missing or corrupt stored value falls back to the initial value.
pub struct LocalStore<T> {
    key: String,
    kv: Arc<dyn KeyValueStore>,
    value: T,
    pending: Arc<Mutex<Option<String>>>,
    debounce: Debouncer,
}

pub type TrackerListStore = LocalStore<Vec<Tracker>>;

impl<T> LocalStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn open(
        kv: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        initial: T,
        window: Duration,
    ) -> Self {
        let key = key.into();
        let value = load(kv.as_ref(), &key).unwrap_or(initial);
        Self {
            key,
            kv,
            value,
            pending: Arc::new(Mutex::new(None)),
            debounce: Debouncer::new(window),
        }
    }

    pub fn read(&self) -> &T {
        &self.value
    }

    pub fn write(&mut self, value: T) {
        match serde_json::to_string(&value) {
            Ok(json) => {
                set_pending(&self.pending, Some(json));
                if tokio::runtime::Handle::try_current().is_ok() {
                    let kv = Arc::clone(&self.kv);
                    let key = self.key.clone();
                    let pending = Arc::clone(&self.pending);
                    self.debounce.schedule(async move {
                        persist_pending(kv.as_ref(), &key, &pending);
                    });
                } else {
                    persist_pending(self.kv.as_ref(), &self.key, &self.pending);
                }
            }
            Err(err) => warn!(key = %self.key, error = %err, "failed to serialize local value"),
        }
        self.value = value;
    }

    /// Physically write the latest value now, if one is pending.
    pub async fn flush(&mut self) {
        self.debounce.flush().await;
        persist_pending(self.kv.as_ref(), &self.key, &self.pending);
    }

    /// Reset to `value` and drop the stored copy entirely.
    pub fn clear(&mut self, value: T) {
        self.debounce.cancel();
        remove_stored(self.kv.as_ref(), &self.key, &self.pending);
        self.value = value;
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.is_some())
            .unwrap_or(false)
    }
}

impl<T> Drop for LocalStore<T> {
    fn drop(&mut self) {
        self.debounce.cancel();
        persist_pending(self.kv.as_ref(), &self.key, &self.pending);
    }
}

fn load<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, error = %err, "failed to read local value; using initial value");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "stored value is corrupt; using initial value");
            None
        }
    }
}

fn set_pending(pending: &Mutex<Option<String>>, value: Option<String>) {
    *lock_pending(pending) = value;
}

fn lock_pending(pending: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The pending lock is held across the physical write so a concurrent
/// `remove_stored` cannot be overtaken by it.
fn persist_pending(kv: &dyn KeyValueStore, key: &str, pending: &Mutex<Option<String>>) {
    let mut guard = lock_pending(pending);
    let Some(json) = guard.take() else {
        return;
    };
    match kv.set(key, &json) {
        Ok(()) => debug!(key, bytes = json.len(), "local value persisted"),
        Err(err) => warn!(key, error = %err, "failed to persist local value"),
    }
}

fn remove_stored(kv: &dyn KeyValueStore, key: &str, pending: &Mutex<Option<String>>) {
    let mut guard = lock_pending(pending);
    *guard = None;
    if let Err(err) = kv.remove(key) {
        warn!(key, error = %err, "failed to remove local value");
    }
}
