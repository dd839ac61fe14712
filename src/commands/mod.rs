pub mod add;
pub mod auth;
pub mod board;
pub mod delete;
pub mod edit;
pub mod lifecycle;
pub mod list;
pub mod show;
pub mod sync;

use crate::error::{Result, StrideError};
use crate::model::Tracker;

/// Resolve a subtask argument: a 1-based position (up to three digits), an
/// exact id, or a unique id prefix.
pub fn resolve_subtask(tracker: &Tracker, input: &str) -> Result<String> {
    let input = input.trim();
    let not_found = || StrideError::SubtaskNotFound {
        tracker: tracker.id.clone(),
        subtask: input.to_string(),
    };
    if input.len() <= 3
        && let Ok(position) = input.parse::<usize>()
    {
        return position
            .checked_sub(1)
            .and_then(|i| tracker.subtasks.get(i))
            .map(|s| s.id.clone())
            .ok_or_else(not_found);
    }
    let matches: Vec<_> = tracker
        .subtasks
        .iter()
        .filter(|s| !input.is_empty() && s.id.starts_with(input))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        _ => Err(not_found()),
    }
}
