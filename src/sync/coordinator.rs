use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::error::{Result, StrideError};
use crate::model::{
    Tracker, TrackerDraft, TrackerPatch, compute_progress, normalize_group, validate_estimate,
    validate_title,
};
use crate::remote::{RemoteError, RemoteTable};
use crate::session::Session;
use crate::store::kv::KeyValueStore;
use crate::store::local::{DEFAULT_WRITE_WINDOW, LocalStore, TRACKERS_KEY, TrackerListStore};
use crate::sync::reconcile::{self, Conflict, Resolution, StartupPlan};

/// Default delay before a mutation is mirrored to the remote table.
pub const DEFAULT_MIRROR_DELAY: Duration = Duration::from_secs(1);

/// Per-session sync lifecycle.
///
/// `Uninitialized` until a session decision is made, then `LocalOnly` (no
/// session, no remote, or a failed reconciliation) or `Syncing` followed by
/// `Synced`. Logout returns to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Uninitialized,
    LocalOnly,
    Syncing,
    Synced,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::LocalOnly => write!(f, "local_only"),
            Self::Syncing => write!(f, "syncing"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub local_debounce: Duration,
    pub mirror_delay: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            local_debounce: DEFAULT_WRITE_WINDOW,
            mirror_delay: DEFAULT_MIRROR_DELAY,
        }
    }
}

/// Snapshot of the coordinator's sync bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub owner_id: Option<String>,
    pub remote_configured: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub trackers: usize,
    pub error: Option<String>,
}

/// Owns the tracker list for one application session.
///
/// Every mutation applies to memory first, then to the local mirror, then
/// schedules a whole-list push to the remote table once the session has
/// reconciled. Remote failures never undo a local change.
pub struct TrackerCoordinator {
    trackers: Vec<Tracker>,
    local: TrackerListStore,
    remote: Option<Arc<dyn RemoteTable>>,
    session: Option<Session>,
    state: SyncState,
    reconcile_attempted: bool,
    synced_at: Option<DateTime<Utc>>,
    last_error: Option<RemoteError>,
    mirror: Debouncer,
}

impl TrackerCoordinator {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn RemoteTable>>,
        options: CoordinatorOptions,
    ) -> Self {
        let local = LocalStore::open(kv, TRACKERS_KEY, Vec::new(), options.local_debounce);
        let trackers = repaired(local.read().clone());
        Self {
            trackers,
            local,
            remote,
            session: None,
            state: SyncState::Uninitialized,
            reconcile_attempted: false,
            synced_at: None,
            last_error: None,
            mirror: Debouncer::new(options.mirror_delay),
        }
    }

    /// Swap the remote table, e.g. when a new session brings a new token.
    pub fn set_remote(&mut self, remote: Option<Arc<dyn RemoteTable>>) {
        self.remote = remote;
    }

    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    pub fn get(&self, id: &str) -> Result<&Tracker> {
        self.trackers
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| StrideError::TrackerNotFound(id.to_string()))
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve_id(&self, input: &str) -> Result<String> {
        let input = input.trim();
        if self.trackers.iter().any(|t| t.id == input) {
            return Ok(input.to_string());
        }
        let matches: Vec<&Tracker> = if input.is_empty() {
            Vec::new()
        } else {
            self.trackers
                .iter()
                .filter(|t| t.id.starts_with(input))
                .collect()
        };
        match matches.as_slice() {
            [] => Err(StrideError::TrackerNotFound(input.to_string())),
            [only] => Ok(only.id.clone()),
            many => Err(StrideError::TrackerIdAmbiguous(input.to_string(), many.len())),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    /// The retained error from the last reconciliation or explicit resolution.
    pub fn last_error(&self) -> Option<&RemoteError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state,
            owner_id: self.session.as_ref().map(|s| s.owner_id.clone()),
            remote_configured: self.remote.is_some(),
            synced_at: self.synced_at,
            trackers: self.trackers.len(),
            error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn add(&mut self, draft: TrackerDraft) -> Result<Tracker> {
        let tracker = draft.into_tracker(Utc::now())?;
        self.trackers.push(tracker.clone());
        self.persist();
        info!(id = %tracker.id, title = %tracker.title, "tracker added");
        Ok(tracker)
    }

    /// Replace the given fields. New subtasks re-derive progress against the
    /// record's current `completed` flag.
    pub fn update(&mut self, id: &str, patch: TrackerPatch) -> Result<Tracker> {
        self.modify(id, |t| {
            if let Some(title) = patch.title {
                t.title = validate_title(&title)?;
            }
            if let Some(description) = patch.description {
                t.description = description;
            }
            if let Some(estimate) = patch.time_estimate {
                t.time_estimate = validate_estimate(estimate)?;
            }
            if let Some(deadline) = patch.deadline {
                t.deadline = deadline;
            }
            if let Some(group) = patch.group {
                t.group = normalize_group(group)?;
            }
            if let Some(in_progress) = patch.in_progress {
                t.in_progress = in_progress;
            }
            if let Some(subtasks) = patch.subtasks {
                t.subtasks = subtasks;
                t.progress = compute_progress(&t.subtasks, t.completed);
                t.settle_celebrated();
            }
            Ok(())
        })
    }

    /// Remove a tracker. With a session, the remote row is deleted first;
    /// a remote failure is logged and the local delete goes ahead.
    pub async fn delete(&mut self, id: &str) -> Result<Tracker> {
        self.position(id)?;
        if let (Some(remote), Some(session)) = (self.remote.clone(), self.session.as_ref()) {
            let owner = session.owner_id.clone();
            if let Err(err) = remote.delete_one(id, &owner).await {
                warn!(id, error = %err, "remote delete failed; deleting locally");
            }
        }
        let index = self.position(id)?;
        let removed = self.trackers.remove(index);
        self.persist();
        info!(id, "tracker deleted");
        Ok(removed)
    }

    /// Flip `completed`. Completing forces every subtask done; reopening
    /// leaves subtasks as they are and re-derives from them.
    pub fn toggle_completed(&mut self, id: &str) -> Result<Tracker> {
        self.modify(id, |t| {
            t.completed = !t.completed;
            if t.completed {
                for subtask in &mut t.subtasks {
                    subtask.completed = true;
                }
                t.progress = 100;
                t.in_progress = false;
            } else {
                t.recompute_progress();
                if !t.subtasks.is_empty() {
                    t.completed = t.progress == 100;
                }
            }
            t.settle_celebrated();
            Ok(())
        })
    }

    pub fn toggle_subtask(&mut self, tracker_id: &str, subtask_id: &str) -> Result<Tracker> {
        self.modify(tracker_id, |t| {
            let index = t.subtask_position(subtask_id)?;
            let subtask = &mut t.subtasks[index];
            subtask.completed = !subtask.completed;
            if subtask.completed {
                subtask.in_progress = false;
            }
            t.recompute_progress();
            t.completed = t.progress == 100;
            t.settle_celebrated();
            Ok(())
        })
    }

    pub fn complete_all_subtasks(&mut self, tracker_id: &str) -> Result<Tracker> {
        self.modify(tracker_id, |t| {
            for subtask in &mut t.subtasks {
                subtask.completed = true;
                subtask.in_progress = false;
            }
            t.progress = 100;
            t.completed = true;
            t.celebrated = false;
            t.in_progress = false;
            Ok(())
        })
    }

    pub fn reset_all_subtasks(&mut self, tracker_id: &str) -> Result<Tracker> {
        self.modify(tracker_id, |t| {
            for subtask in &mut t.subtasks {
                subtask.completed = false;
            }
            t.progress = 0;
            t.completed = false;
            t.celebrated = false;
            Ok(())
        })
    }

    pub fn toggle_tracker_in_progress(&mut self, id: &str) -> Result<Tracker> {
        self.modify(id, |t| {
            t.in_progress = !t.in_progress;
            Ok(())
        })
    }

    /// Flip one subtask's flag. An active subtask marks the parent active;
    /// the parent flag is never cleared from here.
    pub fn toggle_subtask_in_progress(
        &mut self,
        tracker_id: &str,
        subtask_id: &str,
    ) -> Result<Tracker> {
        self.modify(tracker_id, |t| {
            let index = t.subtask_position(subtask_id)?;
            t.subtasks[index].in_progress = !t.subtasks[index].in_progress;
            t.in_progress = t.in_progress || t.subtasks.iter().any(|s| s.in_progress);
            Ok(())
        })
    }

    /// Record that the completion notice was shown. Ignored below 100%.
    pub fn mark_celebrated(&mut self, id: &str) -> Result<Tracker> {
        self.modify(id, |t| {
            if t.progress == 100 {
                t.celebrated = true;
            } else {
                debug!(id = %t.id, progress = t.progress, "not celebrating unfinished tracker");
            }
            Ok(())
        })
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.trackers
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StrideError::TrackerNotFound(id.to_string()))
    }

    /// Apply `f` to a copy of the record; commit only if it succeeds.
    fn modify<F>(&mut self, id: &str, f: F) -> Result<Tracker>
    where
        F: FnOnce(&mut Tracker) -> Result<()>,
    {
        let index = self.position(id)?;
        let mut next = self.trackers[index].clone();
        f(&mut next)?;
        self.trackers[index] = next.clone();
        self.persist();
        Ok(next)
    }

    fn persist(&mut self) {
        self.local.write(self.trackers.clone());
        self.schedule_mirror();
    }

    fn schedule_mirror(&mut self) {
        if self.state != SyncState::Synced {
            return;
        }
        let (Some(remote), Some(session)) = (self.remote.clone(), self.session.as_ref()) else {
            return;
        };
        let owner = session.owner_id.clone();
        let records = self.trackers.clone();
        self.mirror.schedule(async move {
            match remote.upsert_many(&owner, &records).await {
                Ok(()) => debug!(records = records.len(), "mirrored trackers to remote"),
                Err(err) => warn!(error = %err, "background mirror failed; local data kept"),
            }
        });
    }

    /// React to a session change: a new owner reconciles, `None` logs out,
    /// the same owner only refreshes the stored session.
    pub async fn apply_session(&mut self, session: Option<Session>) {
        match session {
            None => {
                if self.session.is_some() {
                    self.end_session();
                }
                self.state = SyncState::LocalOnly;
            }
            Some(next) => {
                let same_owner = self
                    .session
                    .as_ref()
                    .is_some_and(|current| current.owner_id == next.owner_id);
                if same_owner {
                    self.session = Some(next);
                    return;
                }
                if self.session.is_some() {
                    self.end_session();
                }
                self.session = Some(next);
                self.reconcile().await;
            }
        }
    }

    /// Follow a session signal until its sender goes away.
    pub async fn follow_sessions(&mut self, mut sessions: watch::Receiver<Option<Session>>) {
        loop {
            let session = sessions.borrow_and_update().clone();
            self.apply_session(session).await;
            if sessions.changed().await.is_err() {
                break;
            }
        }
    }

    /// One-time startup reconciliation for the current session. Later calls
    /// are no-ops, failed attempts included.
    pub async fn reconcile(&mut self) {
        if self.reconcile_attempted {
            return;
        }
        let Some(owner) = self.session.as_ref().map(|s| s.owner_id.clone()) else {
            self.state = SyncState::LocalOnly;
            return;
        };
        let Some(remote) = self.remote.clone() else {
            debug!("signed in without a remote table; staying local");
            self.state = SyncState::LocalOnly;
            return;
        };

        self.reconcile_attempted = true;
        self.state = SyncState::Syncing;

        let cloud = match remote.fetch_all(&owner).await {
            Ok(cloud) => cloud,
            Err(err) => {
                warn!(error = %err, "reconciliation fetch failed; using local data");
                self.trackers = repaired(self.local.read().clone());
                self.last_error = Some(err);
                self.state = SyncState::LocalOnly;
                return;
            }
        };

        match reconcile::plan_startup(&self.trackers, cloud) {
            StartupPlan::AdoptRemote(records) => {
                info!(records = records.len(), "adopted remote trackers");
                self.trackers = repaired(records);
                self.local.write(self.trackers.clone());
            }
            StartupPlan::PushLocal(records) => {
                info!(records = records.len(), "seeding remote from local trackers");
                if let Err(err) = remote.upsert_many(&owner, &records).await {
                    warn!(error = %err, "initial push failed");
                    self.last_error = Some(err);
                }
            }
            StartupPlan::Empty => debug!("nothing to reconcile"),
        }

        self.state = SyncState::Synced;
        self.synced_at = Some(Utc::now());
    }

    /// Sign out: forget the session and clear memory and the local mirror.
    pub fn end_session(&mut self) {
        self.mirror.cancel();
        self.session = None;
        self.state = SyncState::Uninitialized;
        self.reconcile_attempted = false;
        self.synced_at = None;
        self.last_error = None;
        self.trackers.clear();
        self.local.clear(Vec::new());
        info!("session ended; local trackers cleared");
    }

    fn remote_target(&self) -> Result<(Arc<dyn RemoteTable>, String)> {
        let session = self.session.as_ref().ok_or(StrideError::NotSignedIn)?;
        let remote = self.remote.clone().ok_or(StrideError::RemoteNotConfigured)?;
        Ok((remote, session.owner_id.clone()))
    }

    /// Fetch the cloud set and compare it with the local one. Fetch failures
    /// are retained and reported as no conflict.
    pub async fn detect_conflict(&mut self) -> Result<Option<Conflict>> {
        let (remote, owner) = self.remote_target()?;
        match remote.fetch_all(&owner).await {
            Ok(cloud) => Ok(Conflict::between(&self.trackers, &cloud)),
            Err(err) => {
                warn!(error = %err, "conflict check could not reach the cloud");
                self.last_error = Some(err);
                Ok(None)
            }
        }
    }

    /// Explicit, caller-chosen resolution between local and cloud sets.
    ///
    /// Only missing session or remote is returned as an error. Remote
    /// failures are retained: a failed fetch leaves local data untouched, a
    /// failed push keeps the resolved set locally.
    pub async fn resolve_conflict(&mut self, strategy: Resolution) -> Result<()> {
        let (remote, owner) = self.remote_target()?;
        self.mirror.cancel();

        let cloud = if strategy.needs_cloud() {
            match remote.fetch_all(&owner).await {
                Ok(cloud) => cloud,
                Err(err) => {
                    warn!(%strategy, error = %err, "resolution fetch failed; keeping local data");
                    self.last_error = Some(err);
                    return Ok(());
                }
            }
        } else {
            Vec::new()
        };

        let resolved = reconcile::resolve(strategy, &self.trackers, &cloud);
        self.trackers = repaired(resolved.records);
        self.local.write(self.trackers.clone());
        self.last_error = None;

        if resolved.push
            && let Err(err) = remote.upsert_many(&owner, &self.trackers).await
        {
            warn!(%strategy, error = %err, "resolution push failed");
            self.last_error = Some(err);
        }

        self.reconcile_attempted = true;
        self.state = SyncState::Synced;
        self.synced_at = Some(Utc::now());
        info!(%strategy, records = self.trackers.len(), "conflict resolved");
        Ok(())
    }

    /// Flush the pending remote mirror and local write. Call before exit.
    pub async fn shutdown(&mut self) {
        self.mirror.flush().await;
        self.local.flush().await;
    }
}

fn repaired(mut trackers: Vec<Tracker>) -> Vec<Tracker> {
    for tracker in &mut trackers {
        tracker.repair_derived();
    }
    trackers
}
