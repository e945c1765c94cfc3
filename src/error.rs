use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimtransError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid string key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Fetch error for {what}: {message}")]
    Fetch { what: String, message: String },

    #[error("Timed out after {seconds}s while fetching {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("Unknown simulation: {0}")]
    UnknownSimulation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SimtransError {
    pub fn fetch(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            what: what.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimtransError>;
