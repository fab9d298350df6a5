use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Record not found after write: {0}")]
    Missing(String),

    #[error("Invalid record: {0}")]
    Invalid(String),
}
