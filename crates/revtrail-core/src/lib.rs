//! Core utilities and types shared across all Revtrail crates

pub mod config;
pub mod error;
pub mod types;
pub mod website;

// Re-export commonly used types
pub use config::*;
pub use error::*;
pub use types::*;
pub use website::{Website, WebsiteSettings};

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
