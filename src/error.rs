// Glimpse Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlimpseError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("{tool} timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("Derivation error: {0}")]
    Derivation(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    #[error("A scan is already running")]
    ScanAlreadyRunning,

    #[error("Root unavailable: {0}")]
    RootUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl GlimpseError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        GlimpseError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for GlimpseError {
    fn from(err: anyhow::Error) -> Self {
        GlimpseError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GlimpseError>;
