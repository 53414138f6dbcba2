//! Error handling and custom error types
//!
//! Provides unified error handling across the optimizer using thiserror.
//! Transport-level failures (malformed uploads, oversized bodies) are owned
//! by the HTTP and serverless layers and never reach this enum.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Codec(err.to_string())
    }
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_codec(&self) -> bool {
        matches!(self, Error::Codec(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
