use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, StrideError};
use crate::remote::RemoteTable;
use crate::remote::auth::HttpIdentity;
use crate::remote::http::HttpTable;
use crate::session::{IdentityProvider, Session, SessionStore};
use crate::store::kv::{KeyValueStore, SqliteStore};
use crate::store::lock::DataDirLock;
use crate::store::paths;
use crate::sync::coordinator::{CoordinatorOptions, TrackerCoordinator};

/// An opened data directory: config, persisted session and the coordinator.
pub struct App {
    config: Config,
    sessions: SessionStore,
    offline: bool,
    pub coordinator: TrackerCoordinator,
    lock: DataDirLock,
}

impl App {
    /// Open (creating if needed) the data directory and attach the stored
    /// session. With a session and a remote this runs the startup
    /// reconciliation.
    pub async fn open(home: &Path, offline: bool) -> Result<Self> {
        fs::create_dir_all(home)?;
        let lock = DataDirLock::acquire(&paths::lock_path(home))?;
        let config = Config::load(home)?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&paths::database_path(home))?);
        let sessions = SessionStore::new(Arc::clone(&kv));

        let options = CoordinatorOptions {
            local_debounce: config.local_debounce(),
            mirror_delay: config.mirror_delay(),
        };
        let mut app = Self {
            coordinator: TrackerCoordinator::new(kv, None, options),
            config,
            sessions,
            offline,
            lock,
        };

        let session = if offline {
            None
        } else {
            app.sessions
                .current()
                .filter(|s| {
                    let expired = s.is_expired(Utc::now());
                    if expired {
                        warn!(owner_id = %s.owner_id, "stored session expired; working locally");
                    }
                    !expired
                })
        };
        app.attach(session).await?;
        Ok(app)
    }

    fn remote_for(&self, session: &Session) -> Result<Option<Arc<dyn RemoteTable>>> {
        if self.offline {
            return Ok(None);
        }
        let Some(remote) = self.config.remote.as_ref() else {
            return Ok(None);
        };
        let table = HttpTable::new(remote)?.with_access_token(session.access_token.clone());
        Ok(Some(Arc::new(table)))
    }

    async fn attach(&mut self, session: Option<Session>) -> Result<()> {
        if let Some(ref session) = session {
            let remote = self.remote_for(session)?;
            self.coordinator.set_remote(remote);
        }
        self.coordinator.apply_session(session).await;
        Ok(())
    }

    fn identity(&self) -> Result<HttpIdentity> {
        let remote = self
            .config
            .remote
            .as_ref()
            .ok_or(StrideError::RemoteNotConfigured)?;
        Ok(HttpIdentity::new(remote)?)
    }

    async fn start_session(&mut self, session: Session) -> Result<()> {
        self.sessions.save(&session)?;
        info!(owner_id = %session.owner_id, "signed in");
        self.attach(Some(session)).await
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        let session = self.identity()?.sign_in(email, password).await?;
        self.start_session(session).await
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<()> {
        let session = self.identity()?.sign_up(email, password).await?;
        self.start_session(session).await
    }

    /// Adopt an externally issued token as the current session.
    pub async fn sign_in_with_token(&mut self, owner_id: &str, token: &str) -> Result<()> {
        self.start_session(Session::new(owner_id, token)).await
    }

    /// Forget the session and clear local trackers. The identity service is
    /// told on a best-effort basis.
    pub async fn sign_out(&mut self) -> Result<()> {
        if let Some(session) = self.sessions.current()
            && let Ok(identity) = self.identity()
            && let Err(err) = identity.sign_out(&session).await
        {
            warn!(error = %err, "identity sign-out failed; clearing local session anyway");
        }
        self.sessions.clear()?;
        self.coordinator.end_session();
        self.coordinator.set_remote(None);
        Ok(())
    }

    /// Flush pending writes and release the data-directory lock. Dropping
    /// without closing still persists the local write but skips a pending
    /// remote mirror.
    pub async fn close(mut self) {
        self.coordinator.shutdown().await;
        let path = self.lock.path().to_path_buf();
        if let Err(err) = self.lock.release() {
            warn!(lock = %path.display(), error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackerDraft;
    use crate::sync::coordinator::SyncState;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_data_dir_and_works_locally() {
        let dir = tempdir().unwrap();
        let home = dir.path().join("home");
        let mut app = App::open(&home, false).await.unwrap();
        assert!(paths::database_path(&home).exists());
        assert_eq!(app.coordinator.state(), SyncState::LocalOnly);

        app.coordinator.add(TrackerDraft::new("Persist me", 10)).unwrap();
        app.close().await;

        let reopened = App::open(&home, true).await.unwrap();
        assert_eq!(reopened.coordinator.trackers().len(), 1);
        assert_eq!(reopened.coordinator.trackers()[0].title, "Persist me");
    }

    #[tokio::test]
    async fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let _first = App::open(dir.path(), true).await.unwrap();
        let err = App::open(dir.path(), true).await.err().unwrap();
        assert_eq!(err.code(), "locked");
    }

    #[tokio::test]
    async fn token_session_without_remote_stays_local_and_sign_out_clears() {
        let dir = tempdir().unwrap();
        let mut app = App::open(dir.path(), false).await.unwrap();
        app.coordinator.add(TrackerDraft::new("Mine", 10)).unwrap();

        app.sign_in_with_token("owner-1", "token").await.unwrap();
        assert_eq!(app.coordinator.state(), SyncState::LocalOnly);
        assert_eq!(app.coordinator.trackers().len(), 1);

        app.sign_out().await.unwrap();
        assert!(app.coordinator.trackers().is_empty());
        assert_eq!(app.coordinator.state(), SyncState::Uninitialized);
        app.close().await;

        let reopened = App::open(dir.path(), false).await.unwrap();
        assert!(reopened.coordinator.trackers().is_empty());
        assert!(reopened.coordinator.session().is_none());
    }
}
