use thiserror::Error;

/// Error taxonomy for the dashboard core.
///
/// `Transport` covers stream drops and fetch failures and is recovered
/// locally (reconnect or fallback poll). `Decode` covers malformed push
/// payloads, which are dropped and logged. `Command` covers rejected or
/// failed control operations and is surfaced to the operator. `Internal`
/// indicates a programming defect, not a runtime condition to recover from.
#[derive(Error, Debug)]
pub enum DashError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Failed to decode stream payload: {message}")]
    Decode { message: String },

    #[error("Command '{operation}' failed: {message}")]
    Command { operation: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> Self {
        DashError::Transport {
            message: err.to_string(),
        }
    }
}

pub type DashResult<T> = Result<T, DashError>;
