use crate::app::App;
use crate::error::Result;
use crate::output::{self, Format};

pub async fn run(app: &mut App, id: &str, format: Format) -> Result<()> {
    let id = app.coordinator.resolve_id(id)?;
    let removed = app.coordinator.delete(&id).await?;
    match format {
        Format::Json => output::print_tracker(&removed, format)?,
        _ => eprintln!("Deleted tracker {} ({})", removed.title, removed.id),
    }
    Ok(())
}
