use serde_json::json;

use crate::app::App;
use crate::error::Result;
use crate::output::{self, Format};
use crate::sync::reconcile::Resolution;

/// Report sync state. With `check`, also compare against the cloud set.
pub async fn status(app: &mut App, check: bool, dismiss: bool, format: Format) -> Result<()> {
    let conflict = if check {
        app.coordinator.detect_conflict().await?
    } else {
        None
    };
    let status = app.coordinator.status();
    if dismiss {
        app.coordinator.dismiss_error();
    }

    match format {
        Format::Json => println!(
            "{}",
            json!({
                "status": status,
                "conflict": conflict,
            })
        ),
        _ => {
            output::print_status(&status, format)?;
            if let Some(conflict) = conflict {
                println!(
                    "conflict: {} local-only, {} cloud-only, {} differing (resolve with `stride resolve --strategy local|cloud|merge`)",
                    conflict.local_only, conflict.cloud_only, conflict.differing
                );
            } else if check {
                println!("conflict: none");
            }
        }
    }
    Ok(())
}

pub async fn resolve(app: &mut App, strategy: Resolution, format: Format) -> Result<()> {
    app.coordinator.resolve_conflict(strategy).await?;
    output::print_status(&app.coordinator.status(), format)?;
    Ok(())
}
