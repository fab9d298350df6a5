use revtrail_database::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session {0} expired again after rotation")]
    SessionConflict(String),
}
