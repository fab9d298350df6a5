use async_trait::async_trait;
use revtrail_core::{DateRange, Granularity, UtcDateTime};

use crate::types::responses::{
    BreakdownItem, ChannelBreakdown, Metrics, RealtimeVisitor, RevenuePoint, SalesPoint,
    VisitorsPoint,
};
use crate::types::{
    AnalyticsError, LocationDimension, PathDimension, SourceDimension, SystemDimension,
};

/// Read-side aggregations over tracked sessions, page views, payments and goals.
///
/// Every range is inclusive on both ends. Time series only contain buckets
/// that saw at least one event.
#[async_trait]
pub trait Analytics: Send + Sync {
    /// Distinct visitors per time bucket, from page views
    async fn visitors_over_time(
        &self,
        website_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<VisitorsPoint>, AnalyticsError>;

    /// New, renewal and refunded revenue per time bucket
    async fn revenue_over_time(
        &self,
        website_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<RevenuePoint>, AnalyticsError>;

    /// Distinct paying customers and sale counts per time bucket
    async fn customers_and_sales_over_time(
        &self,
        website_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<SalesPoint>, AnalyticsError>;

    /// Sessions grouped by channel, with per-referrer detail nested under each
    async fn channel_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<ChannelBreakdown>, AnalyticsError>;

    async fn path_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: PathDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError>;

    async fn location_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: LocationDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError>;

    async fn system_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: SystemDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError>;

    async fn source_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: SourceDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError>;

    /// Headline numbers for a range
    async fn metrics(&self, website_id: &str, range: DateRange)
        -> Result<Metrics, AnalyticsError>;

    /// Distinct visitors seen within the live window ending at `now`
    async fn visitors_now(&self, website_id: &str, now: UtcDateTime)
        -> Result<i64, AnalyticsError>;

    /// Sessions active within the live window, most recent first
    async fn realtime_visitors(
        &self,
        website_id: &str,
        now: UtcDateTime,
    ) -> Result<Vec<RealtimeVisitor>, AnalyticsError>;
}
