use crate::app::App;
use crate::error::Result;
use crate::output::{self, Format};

pub fn run(app: &App, id: &str, format: Format) -> Result<()> {
    let id = app.coordinator.resolve_id(id)?;
    let tracker = app.coordinator.get(&id)?;
    output::print_tracker(tracker, format)?;
    Ok(())
}
