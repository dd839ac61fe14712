use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum StrideError {
    #[error("tracker {0} not found")]
    TrackerNotFound(String),

    #[error("tracker id prefix '{0}' is ambiguous ({1} matches)")]
    TrackerIdAmbiguous(String, usize),

    #[error("subtask {subtask} not found in tracker {tracker}")]
    SubtaskNotFound { tracker: String, subtask: String },

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("time estimate must be a positive integer (got {0})")]
    InvalidEstimate(i64),

    #[error("a tracker can carry at most 3 group labels (got {0})")]
    TooManyGroups(usize),

    #[error("invalid date '{0}' (expected RFC 3339, YYYY-MM-DD or YYYY-MM-DDTHH:MM)")]
    InvalidDate(String),

    #[error("not signed in (run `stride login` first)")]
    NotSignedIn,

    #[error("no remote configured (set `remote` in config.json or STRIDE_REMOTE_URL)")]
    RemoteNotConfigured,

    #[error("locked by another process: {0}")]
    Locked(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl StrideError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TrackerNotFound(_) => "tracker_not_found",
            Self::TrackerIdAmbiguous(_, _) => "tracker_id_ambiguous",
            Self::SubtaskNotFound { .. } => "subtask_not_found",
            Self::EmptyTitle => "empty_title",
            Self::InvalidEstimate(_) => "invalid_estimate",
            Self::TooManyGroups(_) => "too_many_groups",
            Self::InvalidDate(_) => "invalid_date",
            Self::NotSignedIn => "not_signed_in",
            Self::RemoteNotConfigured => "remote_not_configured",
            Self::Locked(_) => "locked",
            Self::Remote(err) => err.code(),
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Db(_) => "db_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, StrideError>;
