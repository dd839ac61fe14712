use crate::app::App;
use crate::commands::resolve_subtask;
use crate::error::Result;
use crate::model::Tracker;
use crate::output::{self, Format};

/// Tracker-level state changes driven from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleCompleted,
    ToggleInProgress,
    CompleteAll,
    ResetAll,
    Celebrate,
}

/// Subtask-level state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskAction {
    ToggleCompleted,
    ToggleInProgress,
}

fn report(tracker: &Tracker, format: Format) -> Result<()> {
    output::print_tracker(tracker, format)?;
    if tracker.progress == 100 && !tracker.celebrated && format != Format::Json {
        eprintln!(
            "All done with \"{}\"! Run `stride celebrate {}` to dismiss.",
            tracker.title,
            output::short_id(&tracker.id)
        );
    }
    Ok(())
}

pub fn run(app: &mut App, id: &str, action: Action, format: Format) -> Result<()> {
    let id = app.coordinator.resolve_id(id)?;
    let coordinator = &mut app.coordinator;
    let tracker = match action {
        Action::ToggleCompleted => coordinator.toggle_completed(&id)?,
        Action::ToggleInProgress => coordinator.toggle_tracker_in_progress(&id)?,
        Action::CompleteAll => coordinator.complete_all_subtasks(&id)?,
        Action::ResetAll => coordinator.reset_all_subtasks(&id)?,
        Action::Celebrate => coordinator.mark_celebrated(&id)?,
    };
    report(&tracker, format)
}

pub fn run_subtask(
    app: &mut App,
    id: &str,
    subtask: &str,
    action: SubtaskAction,
    format: Format,
) -> Result<()> {
    let id = app.coordinator.resolve_id(id)?;
    let subtask_id = resolve_subtask(app.coordinator.get(&id)?, subtask)?;
    let tracker = match action {
        SubtaskAction::ToggleCompleted => app.coordinator.toggle_subtask(&id, &subtask_id)?,
        SubtaskAction::ToggleInProgress => {
            app.coordinator.toggle_subtask_in_progress(&id, &subtask_id)?
        }
    };
    report(&tracker, format)
}
