use revtrail_database::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Payment not found: {provider}/{provider_payment_id}")]
    NotFound {
        provider: String,
        provider_payment_id: String,
    },

    #[error("Invalid payment: {0}")]
    Invalid(String),
}
