//! Payment ingestion and attribution for Revtrail

pub mod error;
pub mod linker;
pub mod metadata;
pub mod service;
pub mod types;

pub use error::PaymentError;
pub use linker::PaymentLinker;
pub use metadata::PaymentMetadata;
pub use service::PaymentService;
pub use types::{Attribution, AttributionMethod, PaymentEvent, PaymentOutcome};
