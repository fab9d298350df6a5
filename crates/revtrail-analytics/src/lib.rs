//! Aggregations over the Revtrail event log
//!
//! Time series, point metrics and dimensional breakdowns computed from
//! sessions, page views, payments and goal events read through an
//! [`revtrail_database::EventStore`].

pub mod analytics;
mod channels;
pub mod traits;
pub mod types;

pub use analytics::{conversion_score, AnalyticsService};
pub use traits::Analytics;
pub use types::*;
