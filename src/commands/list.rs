use chrono::Utc;

use crate::app::App;
use crate::board::{self, Column};
use crate::error::Result;
use crate::output::{self, Format};

pub fn run(
    app: &App,
    group: Option<String>,
    column: Option<Column>,
    pending: bool,
    completed: bool,
    format: Format,
) -> Result<()> {
    let now = Utc::now();
    let mut trackers = app.coordinator.trackers().to_vec();

    if let Some(ref g) = group {
        trackers.retain(|t| t.group.contains(g));
    }
    if let Some(c) = column {
        trackers.retain(|t| board::classify(t, now) == c);
    }
    if pending {
        trackers.retain(|t| !t.completed);
    }
    if completed {
        trackers.retain(|t| t.completed);
    }

    output::print_trackers(&trackers, format)?;
    Ok(())
}
