use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Fetch failed for {source_name}: {message}")]
    Fetch { source_name: String, message: String },

    #[error("Fetch from {source_name} timed out after {timeout:?}")]
    FetchTimeout { source_name: String, timeout: std::time::Duration },

    #[error("Request {generation} superseded by request {latest}")]
    Superseded { generation: u64, latest: u64 },

    #[error("Invalid record payload: {0}")]
    Payload(String),

    #[error("Invalid period format: {0}")]
    PeriodParse(String),

    #[error("Invalid date: {0}")]
    DateParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the result was discarded because a newer request started.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Error::Superseded { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
