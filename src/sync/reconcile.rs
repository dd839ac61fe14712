use std::collections::HashMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::Tracker;

/// What the automatic startup reconciliation does with a fetched cloud set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupPlan {
    /// Cloud set is non-empty: it replaces the local set wholesale.
    AdoptRemote(Vec<Tracker>),
    /// Cloud set is empty, local is not: push local up, keep it.
    PushLocal(Vec<Tracker>),
    /// Both empty.
    Empty,
}

/// Prefer the cloud whenever it has anything; otherwise seed it from local.
pub fn plan_startup(local: &[Tracker], remote: Vec<Tracker>) -> StartupPlan {
    if !remote.is_empty() {
        StartupPlan::AdoptRemote(remote)
    } else if !local.is_empty() {
        StartupPlan::PushLocal(local.to_vec())
    } else {
        StartupPlan::Empty
    }
}

/// Caller-selected strategy for an explicit conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the local set and push it to the cloud.
    Local,
    /// Keep the cloud set; nothing is pushed.
    Cloud,
    /// Union by id, newer `createdAt` wins; the result is pushed.
    Merge,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

impl Resolution {
    pub fn needs_cloud(self) -> bool {
        !matches!(self, Self::Local)
    }

    pub fn pushes(self) -> bool {
        !matches!(self, Self::Cloud)
    }
}

/// Canonical set chosen by a resolution and whether it must be pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub records: Vec<Tracker>,
    pub push: bool,
}

pub fn resolve(strategy: Resolution, local: &[Tracker], cloud: &[Tracker]) -> Resolved {
    let records = match strategy {
        Resolution::Local => local.to_vec(),
        Resolution::Cloud => cloud.to_vec(),
        Resolution::Merge => merge_by_id(local, cloud),
    };
    Resolved {
        records,
        push: strategy.pushes(),
    }
}

/// Union of both sets keyed by id, local order first, cloud-only records
/// appended. On an id collision the copy with the strictly greater
/// `created_at` wins; ties keep the local copy.
pub fn merge_by_id(local: &[Tracker], cloud: &[Tracker]) -> Vec<Tracker> {
    let mut merged = local.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();

    for candidate in cloud {
        match index.get(&candidate.id) {
            Some(&i) => {
                if candidate.created_at > merged[i].created_at {
                    merged[i] = candidate.clone();
                }
            }
            None => {
                index.insert(candidate.id.clone(), merged.len());
                merged.push(candidate.clone());
            }
        }
    }
    merged
}

/// Local and cloud sets that are both non-empty and disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub local_only: usize,
    pub cloud_only: usize,
    pub differing: usize,
}

impl Conflict {
    pub fn between(local: &[Tracker], cloud: &[Tracker]) -> Option<Self> {
        if local.is_empty() || cloud.is_empty() {
            return None;
        }
        let cloud_by_id: HashMap<&str, &Tracker> =
            cloud.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut local_only = 0;
        let mut differing = 0;
        for tracker in local {
            match cloud_by_id.get(tracker.id.as_str()) {
                Some(other) if *other != tracker => differing += 1,
                Some(_) => {}
                None => local_only += 1,
            }
        }
        let cloud_only = cloud
            .iter()
            .filter(|t| !local.iter().any(|l| l.id == t.id))
            .count();

        if local_only == 0 && cloud_only == 0 && differing == 0 {
            return None;
        }
        Some(Self {
            local_only,
            cloud_only,
            differing,
        })
    }
}
