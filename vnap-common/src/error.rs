//! Common error types for VNAP

use thiserror::Error;

/// Common result type for VNAP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across VNAP services
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Gazetteer error: {0}")]
    Gazetteer(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
