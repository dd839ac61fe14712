//! Remote table contract and implementations.
//!
//! The table holds one row per tracker, keyed by tracker id and scoped to an
//! owner id. The coordinator only ever fetches an owner's full set, upserts
//! whole lists, and deletes single rows.

pub mod auth;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Tracker;

pub use memory::MemoryTable;

/// Why an upsert was rejected. The variants render distinct reasons; the
/// coordinator does not branch on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveFailure {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("a tracker with this id already exists: {0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("could not load trackers from the cloud: {0}")]
    Fetch(String),

    #[error("could not save trackers to the cloud: {0}")]
    Save(SaveFailure),

    #[error("could not delete tracker from the cloud: {0}")]
    Delete(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl RemoteError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch_failed",
            Self::Save(SaveFailure::PermissionDenied(_)) => "save_permission_denied",
            Self::Save(SaveFailure::DuplicateKey(_)) => "save_duplicate_key",
            Self::Save(SaveFailure::Other(_)) => "save_failed",
            Self::Delete(_) => "delete_failed",
            Self::Auth(_) => "auth_failed",
        }
    }
}

#[async_trait]
pub trait RemoteTable: Send + Sync {
    async fn fetch_all(&self, owner_id: &str) -> Result<Vec<Tracker>, RemoteError>;

    async fn upsert_many(&self, owner_id: &str, records: &[Tracker]) -> Result<(), RemoteError>;

    async fn delete_one(&self, id: &str, owner_id: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_failures_render_distinct_reasons() {
        let denied = RemoteError::Save(SaveFailure::PermissionDenied("row level security".into()));
        let duplicate = RemoteError::Save(SaveFailure::DuplicateKey("trackers_pkey".into()));
        assert_ne!(denied.to_string(), duplicate.to_string());
        assert!(denied.to_string().contains("permission denied"));
        assert_eq!(denied.code(), "save_permission_denied");
        assert_eq!(duplicate.code(), "save_duplicate_key");
    }
}
