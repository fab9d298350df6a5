use revtrail_core::UtcDateTime;
use revtrail_tracking::Channel;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VisitorsPoint {
    #[schema(value_type = String, format = DateTime)]
    pub date: UtcDateTime,
    pub visitors: i64,
}

/// Payment amounts per bucket, in minor currency units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RevenuePoint {
    #[schema(value_type = String, format = DateTime)]
    pub date: UtcDateTime,
    pub revenue_new: i64,
    pub renewal_revenue: i64,
    pub revenue_refund: i64,
}

impl RevenuePoint {
    pub fn total(&self) -> i64 {
        self.revenue_new + self.renewal_revenue + self.revenue_refund
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SalesPoint {
    #[schema(value_type = String, format = DateTime)]
    pub date: UtcDateTime,
    /// Distinct provider customer ids
    pub customers: i64,
    pub sales: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReferrerType {
    /// Plain referring site
    Referrer,
    /// Community launch or discussion source
    Ref,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReferrerBreakdown {
    pub name: String,
    pub channel: Channel,
    pub uv: i64,
    pub image: String,
    pub is_alternative_source: bool,
    pub referrer_type: ReferrerType,
    /// Grouping key: referrer without protocol and path
    pub original_value: String,
    pub has_paid_medium: bool,
    pub paid_medium_hint: Option<String>,
    pub revenue: i64,
    pub payment_count: i64,
    /// Sessions with a payment per unique visitor
    pub conversion_rate: f64,
    pub goal_count: i64,
    /// Visitors who completed a goal per unique visitor
    pub goal_conversion_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_via: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChannelBreakdown {
    pub name: Channel,
    /// Distinct visitors across all referrers of the channel
    pub uv: i64,
    pub revenue: i64,
    pub payment_count: i64,
    pub conversion_rate: f64,
    pub goal_count: i64,
    pub goal_conversion_rate: f64,
    pub image: Option<String>,
    pub referrers: Vec<ReferrerBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BreakdownItem {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Metrics {
    pub visitors: i64,
    pub page_views: i64,
    /// Non-refunded payments
    pub revenue: i64,
    pub revenue_refund: i64,
    pub net_revenue: i64,
    pub sessions: i64,
    /// Percentage of single-page sessions
    pub bounce_rate: f64,
    /// Average session duration in seconds
    pub session_time: f64,
    /// Percentage of sessions with a non-refunded payment
    pub conversion_rate: f64,
    pub revenue_per_visitor: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RealtimeVisitor {
    pub visitor_id: String,
    pub session_id: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub channel: Channel,
    pub current_path: String,
    #[schema(value_type = String, format = DateTime)]
    pub last_seen_at: UtcDateTime,
    pub page_views: i32,
    pub duration: i64,
    /// 0-100 engagement heuristic from page views and time on site
    pub conversion_score: i64,
}
