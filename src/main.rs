use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use stride::app::App;
use stride::board::Column;
use stride::commands::auth::Credentials;
use stride::commands::lifecycle::{Action, SubtaskAction};
use stride::output::Format;
use stride::store::paths;
use stride::sync::reconcile::Resolution;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "STRIDE_LOG";

#[derive(Parser)]
#[command(
    name = "stride",
    version = stride::build_info::long_version(),
    about = "Task trackers with subtasks, deadlines and cloud sync"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Data directory (defaults to $STRIDE_HOME, then ~/.stride)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// Never contact the remote service
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

fn parse_deadline(input: &str) -> Result<DateTime<Utc>, String> {
    stride::model::parse_time(input).map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new tracker
    Add {
        /// Tracker title
        title: String,
        /// Free-form description
        #[arg(long, short)]
        description: Option<String>,
        /// Time estimate in minutes
        #[arg(long, short, default_value_t = 30)]
        estimate: i64,
        /// Deadline (RFC 3339, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD`)
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
        /// Subtask texts (comma-separated)
        #[arg(long, value_delimiter = ',')]
        subtasks: Vec<String>,
        /// Group labels, at most three (comma-separated)
        #[arg(long, value_delimiter = ',')]
        group: Vec<String>,
        /// Create the tracker already completed
        #[arg(long)]
        done: bool,
    },
    /// List trackers
    List {
        /// Only trackers carrying this group label
        #[arg(long)]
        group: Option<String>,
        /// Only trackers in this board column
        #[arg(long, value_enum)]
        column: Option<Column>,
        /// Only trackers not yet completed
        #[arg(long, conflicts_with = "completed")]
        pending: bool,
        /// Only completed trackers
        #[arg(long)]
        completed: bool,
    },
    /// Display a single tracker
    Show {
        /// Tracker ID or unique prefix
        id: String,
    },
    /// Edit tracker fields
    Edit {
        /// Tracker ID or unique prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        /// Time estimate in minutes
        #[arg(long, short)]
        estimate: Option<i64>,
        #[arg(long, value_parser = parse_deadline, conflicts_with = "clear_deadline")]
        deadline: Option<DateTime<Utc>>,
        /// Remove the deadline
        #[arg(long)]
        clear_deadline: bool,
        /// Replace group labels (comma-separated)
        #[arg(long, value_delimiter = ',')]
        group: Option<Vec<String>>,
        /// Replace the subtask list (comma-separated); unchanged texts keep their state
        #[arg(long, value_delimiter = ',')]
        subtasks: Option<Vec<String>>,
    },
    /// Delete a tracker
    Delete {
        /// Tracker ID or unique prefix
        id: String,
    },
    /// Toggle a tracker's completed flag
    Done { id: String },
    /// Toggle a tracker's in-progress flag
    Start { id: String },
    /// Toggle a subtask's completed flag
    Check {
        id: String,
        /// Subtask position (1-based) or ID prefix
        subtask: String,
    },
    /// Toggle a subtask's in-progress flag
    SubStart {
        id: String,
        /// Subtask position (1-based) or ID prefix
        subtask: String,
    },
    /// Mark every subtask completed
    CompleteAll { id: String },
    /// Mark every subtask open again
    Reset { id: String },
    /// Acknowledge a fully completed tracker
    Celebrate { id: String },
    /// Show trackers laid out by deadline
    Board {
        /// Only trackers carrying this group label
        #[arg(long)]
        group: Option<String>,
    },
    /// Sign in to the sync service
    #[command(group(ArgGroup::new("credentials").required(true).args(["email", "owner"])))]
    Login {
        #[arg(long, requires = "password", conflicts_with_all = ["owner", "token"])]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Owner id for an externally issued token
        #[arg(long, requires = "token")]
        owner: Option<String>,
        /// Externally issued access token
        #[arg(long, requires = "owner")]
        token: Option<String>,
    },
    /// Create an account on the sync service and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and clear local trackers
    Logout,
    /// Show sync status
    Sync {
        /// Compare the local set against the cloud set
        #[arg(long)]
        check: bool,
        /// Clear a retained sync error after reporting it
        #[arg(long)]
        dismiss: bool,
    },
    /// Resolve a local/cloud conflict
    Resolve {
        #[arg(long, value_enum)]
        strategy: Resolution,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, format: Format) -> stride::error::Result<()> {
    let home = paths::resolve_home(cli.home.as_deref());
    let mut app = App::open(&home, cli.offline).await?;
    let result = dispatch(&mut app, cli.command, format).await;
    app.close().await;
    result
}

async fn dispatch(app: &mut App, command: Commands, format: Format) -> stride::error::Result<()> {
    use stride::commands;

    match command {
        Commands::Add {
            title,
            description,
            estimate,
            deadline,
            subtasks,
            group,
            done,
        } => commands::add::run(
            app,
            title,
            description,
            estimate,
            deadline,
            subtasks,
            group,
            done,
            format,
        ),
        Commands::List {
            group,
            column,
            pending,
            completed,
        } => commands::list::run(app, group, column, pending, completed, format),
        Commands::Show { id } => commands::show::run(app, &id, format),
        Commands::Edit {
            id,
            title,
            description,
            estimate,
            deadline,
            clear_deadline,
            group,
            subtasks,
        } => commands::edit::run(
            app,
            &id,
            title,
            description,
            estimate,
            deadline,
            clear_deadline,
            group,
            subtasks,
            format,
        ),
        Commands::Delete { id } => commands::delete::run(app, &id, format).await,
        Commands::Done { id } => commands::lifecycle::run(app, &id, Action::ToggleCompleted, format),
        Commands::Start { id } => {
            commands::lifecycle::run(app, &id, Action::ToggleInProgress, format)
        }
        Commands::Check { id, subtask } => commands::lifecycle::run_subtask(
            app,
            &id,
            &subtask,
            SubtaskAction::ToggleCompleted,
            format,
        ),
        Commands::SubStart { id, subtask } => commands::lifecycle::run_subtask(
            app,
            &id,
            &subtask,
            SubtaskAction::ToggleInProgress,
            format,
        ),
        Commands::CompleteAll { id } => {
            commands::lifecycle::run(app, &id, Action::CompleteAll, format)
        }
        Commands::Reset { id } => commands::lifecycle::run(app, &id, Action::ResetAll, format),
        Commands::Celebrate { id } => commands::lifecycle::run(app, &id, Action::Celebrate, format),
        Commands::Board { group } => commands::board::run(app, group, format),
        Commands::Login {
            email,
            password,
            owner,
            token,
        } => {
            let credentials = match (email, password, owner, token) {
                (Some(email), Some(password), _, _) => Credentials::Password { email, password },
                (_, _, Some(owner_id), Some(token)) => Credentials::Token { owner_id, token },
                _ => return Err(stride::error::StrideError::NotSignedIn),
            };
            commands::auth::login(app, credentials, format).await
        }
        Commands::Signup { email, password } => {
            commands::auth::signup(app, &email, &password, format).await
        }
        Commands::Logout => commands::auth::logout(app, format).await,
        Commands::Sync { check, dismiss } => {
            commands::sync::status(app, check, dismiss, format).await
        }
        Commands::Resolve { strategy } => commands::sync::resolve(app, strategy, format).await,
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format).await {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
