use crate::app::App;
use crate::error::Result;
use crate::output::{self, Format};

/// How the user proves who they are.
pub enum Credentials {
    Password { email: String, password: String },
    Token { owner_id: String, token: String },
}

pub async fn login(app: &mut App, credentials: Credentials, format: Format) -> Result<()> {
    match credentials {
        Credentials::Password { email, password } => app.sign_in(&email, &password).await?,
        Credentials::Token { owner_id, token } => {
            app.sign_in_with_token(&owner_id, &token).await?
        }
    }
    output::print_status(&app.coordinator.status(), format)?;
    Ok(())
}

pub async fn signup(app: &mut App, email: &str, password: &str, format: Format) -> Result<()> {
    app.sign_up(email, password).await?;
    output::print_status(&app.coordinator.status(), format)?;
    Ok(())
}

pub async fn logout(app: &mut App, format: Format) -> Result<()> {
    app.sign_out().await?;
    match format {
        Format::Json => output::print_status(&app.coordinator.status(), format)?,
        _ => eprintln!("Signed out; local trackers cleared"),
    }
    Ok(())
}
