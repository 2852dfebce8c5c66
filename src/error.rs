//! Error types for genq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    /// The external generator settled with a failure for one item.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A 2xx generator response whose body is not the expected JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
