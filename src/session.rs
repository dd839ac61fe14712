use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use crate::error::Result;
use crate::remote::RemoteError;
use crate::store::kv::KeyValueStore;

/// Storage key of the persisted session.
pub const SESSION_KEY: &str = "stride-session";

/// An authenticated session. The coordinator only looks at its presence and
/// at `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            email: None,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// External identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> std::result::Result<Session, RemoteError>;

    async fn sign_up(&self, email: &str, password: &str) -> std::result::Result<Session, RemoteError>;

    async fn sign_out(&self, session: &Session) -> std::result::Result<(), RemoteError>;
}

/// Session persisted in the local key-value store across runs.
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The stored session, if any. Corrupt entries read as signed out.
    pub fn current(&self) -> Option<Session> {
        let raw = match self.kv.get(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "failed to read stored session");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(error = %err, "stored session is corrupt; treating as signed out");
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        self.kv.set(SESSION_KEY, &serde_json::to_string(session)?)
    }

    pub fn clear(&self) -> Result<()> {
        self.kv.remove(SESSION_KEY)
    }
}

/// Current-session signal with change notification.
#[derive(Clone)]
pub struct SessionSignal {
    tx: watch::Sender<Option<Session>>,
}

impl SessionSignal {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
