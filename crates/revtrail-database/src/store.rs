use async_trait::async_trait;
use chrono::Duration;
use revtrail_core::{DateRange, UtcDateTime};
use revtrail_entities::{goal_events, page_views, payments, sessions, visitor_identities};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{NewGoalEvent, NewPageView, NewPayment, NewSession, PaymentInsert, SessionWrite};

/// Persistence seam for ingestion, attribution and aggregation.
///
/// Range queries are inclusive on both ends. Implementations must make
/// `upsert_session` and `insert_payment` atomic with respect to their
/// uniqueness keys.
#[async_trait]
pub trait EventStore: Send + Sync {
    // Sessions and page views
    async fn upsert_session(
        &self,
        session: NewSession,
        now: UtcDateTime,
        ttl: Duration,
    ) -> Result<SessionWrite, StoreError>;

    async fn insert_page_view(
        &self,
        page_view: NewPageView,
    ) -> Result<page_views::Model, StoreError>;

    async fn find_session(
        &self,
        website_id: &str,
        session_id: &str,
    ) -> Result<Option<sessions::Model>, StoreError>;

    /// Sessions whose `first_visit_at` falls in `range`
    async fn sessions_started_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<sessions::Model>, StoreError>;

    /// Sessions whose `last_seen_at` falls in `range`, most recent first
    async fn sessions_seen_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<sessions::Model>, StoreError>;

    async fn latest_session_seen_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Option<sessions::Model>, StoreError>;

    async fn latest_session_for_visitor(
        &self,
        website_id: &str,
        visitor_id: &str,
    ) -> Result<Option<sessions::Model>, StoreError>;

    async fn sessions_by_ids(
        &self,
        website_id: &str,
        session_ids: &[String],
    ) -> Result<Vec<sessions::Model>, StoreError>;

    /// Page views ordered by timestamp
    async fn page_views_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<page_views::Model>, StoreError>;

    /// Most recent page view per session, keyed by session id
    async fn latest_page_views_for_sessions(
        &self,
        website_id: &str,
        session_ids: &[String],
    ) -> Result<HashMap<String, page_views::Model>, StoreError>;

    // Payments
    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentInsert, StoreError>;

    async fn find_payment(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<payments::Model>, StoreError>;

    /// Flips the refund flag only. Returns `None` when the payment is unknown.
    async fn set_payment_refunded(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
        refunded: bool,
    ) -> Result<Option<payments::Model>, StoreError>;

    async fn payments_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<payments::Model>, StoreError>;

    // Goals and identification
    async fn insert_goal_event(
        &self,
        goal: NewGoalEvent,
    ) -> Result<goal_events::Model, StoreError>;

    async fn goal_events_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<goal_events::Model>, StoreError>;

    async fn upsert_visitor_identity(
        &self,
        website_id: &str,
        visitor_id: &str,
        email: &str,
        now: UtcDateTime,
    ) -> Result<visitor_identities::Model, StoreError>;

    /// Visitor most recently identified with `email` (case-insensitive)
    async fn find_visitor_by_email(
        &self,
        website_id: &str,
        email: &str,
    ) -> Result<Option<String>, StoreError>;
}
