use chrono::Utc;

use crate::app::App;
use crate::board;
use crate::error::Result;
use crate::output::{self, Format};

pub fn run(app: &App, group: Option<String>, format: Format) -> Result<()> {
    let board = board::build_board(app.coordinator.trackers(), group.as_deref(), Utc::now());
    output::print_board(&board, format)?;
    Ok(())
}
