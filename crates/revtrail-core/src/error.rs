//! Errors raised while bootstrapping Revtrail: configuration and database setup

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for setup operations
pub type ServiceResult<T> = Result<T, ServiceError>;
