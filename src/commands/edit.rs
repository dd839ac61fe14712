use chrono::{DateTime, Utc};

use crate::app::App;
use crate::error::Result;
use crate::model::{Subtask, TrackerPatch};
use crate::output::{self, Format};

#[allow(clippy::too_many_arguments)]
pub fn run(
    app: &mut App,
    id: &str,
    title: Option<String>,
    description: Option<String>,
    estimate: Option<i64>,
    deadline: Option<DateTime<Utc>>,
    clear_deadline: bool,
    group: Option<Vec<String>>,
    subtasks: Option<Vec<String>>,
    format: Format,
) -> Result<()> {
    let id = app.coordinator.resolve_id(id)?;

    // Subtasks whose text is unchanged keep their id and state.
    let subtasks = subtasks.map(|texts| {
        let current = app
            .coordinator
            .get(&id)
            .map(|t| t.subtasks.clone())
            .unwrap_or_default();
        texts
            .into_iter()
            .map(|text| {
                current
                    .iter()
                    .find(|s| s.text == text)
                    .cloned()
                    .unwrap_or_else(|| Subtask::new(text))
            })
            .collect()
    });

    let patch = TrackerPatch {
        title,
        description,
        time_estimate: estimate,
        deadline: if clear_deadline {
            Some(None)
        } else {
            deadline.map(Some)
        },
        subtasks,
        group,
        in_progress: None,
    };
    if patch.is_empty() {
        eprintln!("nothing to change for tracker {id}");
        output::print_tracker(app.coordinator.get(&id)?, format)?;
        return Ok(());
    }

    let tracker = app.coordinator.update(&id, patch)?;
    output::print_tracker(&tracker, format)?;
    Ok(())
}
