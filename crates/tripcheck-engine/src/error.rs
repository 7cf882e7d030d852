use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by the browser automation driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("click on {selector} failed: {reason}")]
    Click { selector: String, reason: String },

    #[error("screenshot to {path} failed: {reason}")]
    Screenshot { path: PathBuf, reason: String },

    #[error("session state transfer failed: {0}")]
    Session(String),

    #[error("browser connection closed: {0}")]
    Closed(String),
}

impl DriverError {
    /// Load timeouts are absorbed by the poll loop rather than ending a run.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("session file {path} is not valid JSON: {source}")]
    SessionFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("row {row}: missing required field {field}")]
    InvalidStore { row: usize, field: &'static str },

    #[error("input contains no store rows")]
    EmptyInput,
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
