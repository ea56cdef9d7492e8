use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("{backend} backend error: {reason}")]
    Backend { backend: &'static str, reason: String },

    #[error("{what} timed out after {millis} ms")]
    Timeout { what: String, millis: u64 },
}

impl Error {
    pub fn backend(backend: &'static str, reason: impl std::fmt::Display) -> Self {
        Error::Backend { backend, reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
