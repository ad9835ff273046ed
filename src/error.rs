use thiserror::Error;

/// Error taxonomy of the replication core.
///
/// Per-slave failures never surface here - they are stringified into the
/// slave's `AccountResult` and recorded in its trade detail. `CopyError`
/// covers whole-action failures and ingress rejections.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("master account not set")]
    MasterNotSet,

    #[error("session is not active")]
    SessionInactive,

    #[error("session already started in {active} mode")]
    ModeConflict { active: String },

    #[error("invalid mirror token")]
    InvalidToken,

    #[error("failed to parse request body: {0}")]
    Parse(String),

    #[error("exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unknown mirror path: {0}")]
    UnknownPath(String),

    #[error("stop order {0} not found")]
    OrderNotFound(i64),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<serde_json::Error> for CopyError {
    fn from(err: serde_json::Error) -> Self {
        CopyError::Parse(err.to_string())
    }
}

impl From<anyhow::Error> for CopyError {
    fn from(err: anyhow::Error) -> Self {
        CopyError::Internal(err.to_string())
    }
}
