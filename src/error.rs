// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EdgeError>;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("log store error: {0}")]
    LogStore(#[from] std::io::Error),

    #[error("origin error: {0}")]
    Origin(#[from] reqwest::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("mqtt error: {0}")]
    Mqtt(String),

    #[error("{0}")]
    Other(String),
}

impl From<String> for EdgeError {
    fn from(s: String) -> Self {
        EdgeError::Other(s)
    }
}

impl From<&str> for EdgeError {
    fn from(s: &str) -> Self {
        EdgeError::Other(s.to_string())
    }
}
