use chrono::{DateTime, Utc};

use crate::app::App;
use crate::error::Result;
use crate::model::TrackerDraft;
use crate::output::{self, Format};

#[allow(clippy::too_many_arguments)]
pub fn run(
    app: &mut App,
    title: String,
    description: Option<String>,
    estimate: i64,
    deadline: Option<DateTime<Utc>>,
    subtasks: Vec<String>,
    group: Vec<String>,
    done: bool,
    format: Format,
) -> Result<()> {
    let mut draft = TrackerDraft::new(title, estimate).with_subtasks(subtasks);
    draft.description = description.unwrap_or_default();
    draft.deadline = deadline;
    draft.group = group;
    draft.completed = done;

    let tracker = app.coordinator.add(draft)?;
    output::print_tracker(&tracker, format)?;
    Ok(())
}
