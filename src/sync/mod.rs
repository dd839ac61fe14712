//! Keeping the tracker list in step between local storage and the cloud.
//!
//! [`coordinator::TrackerCoordinator`] owns the canonical list and the sync
//! state machine; [`reconcile`] holds the pure set-level decisions it uses.

pub mod coordinator;
pub mod reconcile;
