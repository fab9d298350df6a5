//! Write-side inputs and outcomes of the event store

use revtrail_core::UtcDateTime;
use revtrail_entities::{goal_events, page_views, payments, sessions};

/// First-touch facts captured when a beacon opens or continues a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSession {
    pub website_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub landing_path: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl NewSession {
    pub(crate) fn into_model(self, id: i32, now: UtcDateTime) -> sessions::Model {
        sessions::Model {
            id,
            website_id: self.website_id,
            session_id: self.session_id,
            visitor_id: self.visitor_id,
            first_visit_at: now,
            last_seen_at: now,
            page_views: 1,
            duration: 0,
            bounce: true,
            referrer: self.referrer,
            referrer_domain: self.referrer_domain,
            utm_source: self.utm_source,
            utm_medium: self.utm_medium,
            utm_campaign: self.utm_campaign,
            utm_term: self.utm_term,
            utm_content: self.utm_content,
            landing_path: self.landing_path,
            device: self.device,
            browser: self.browser,
            os: self.os,
            country: self.country,
            region: self.region,
            city: self.city,
        }
    }
}

/// Result of the conditional session upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionWrite {
    /// No row existed; a fresh session was stored
    Created(sessions::Model),
    /// The row existed within its lifetime and was advanced
    Continued(sessions::Model),
    /// The row exists but went idle longer than the session lifetime.
    /// Nothing was written; the caller must mint a new session id.
    Expired(sessions::Model),
}

impl SessionWrite {
    pub fn session(&self) -> &sessions::Model {
        match self {
            SessionWrite::Created(s) | SessionWrite::Continued(s) | SessionWrite::Expired(s) => s,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SessionWrite::Created(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPageView {
    pub website_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub timestamp: UtcDateTime,
    pub path: String,
    pub hostname: Option<String>,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub referrer_path: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl NewPageView {
    pub(crate) fn into_model(self, id: i32) -> page_views::Model {
        page_views::Model {
            id,
            website_id: self.website_id,
            session_id: self.session_id,
            visitor_id: self.visitor_id,
            timestamp: self.timestamp,
            path: self.path,
            hostname: self.hostname,
            title: self.title,
            referrer: self.referrer,
            referrer_domain: self.referrer_domain,
            referrer_path: self.referrer_path,
            utm_source: self.utm_source,
            utm_medium: self.utm_medium,
            utm_campaign: self.utm_campaign,
            utm_term: self.utm_term,
            utm_content: self.utm_content,
            device: self.device,
            browser: self.browser,
            os: self.os,
            country: self.country,
            region: self.region,
            city: self.city,
        }
    }
}

/// A payment ready to be stored, attribution already decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub website_id: String,
    pub provider: String,
    pub provider_payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub refunded: bool,
    pub renewal: bool,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub visitor_id: Option<String>,
    pub session_id: Option<String>,
    pub attribution_method: Option<String>,
    pub timestamp: UtcDateTime,
}

impl NewPayment {
    pub(crate) fn into_model(self, id: i32) -> payments::Model {
        payments::Model {
            id,
            website_id: self.website_id,
            provider: self.provider,
            provider_payment_id: self.provider_payment_id,
            amount: self.amount,
            currency: self.currency,
            refunded: self.refunded,
            renewal: self.renewal,
            customer_email: self.customer_email,
            customer_id: self.customer_id,
            metadata: self.metadata,
            visitor_id: self.visitor_id,
            session_id: self.session_id,
            attribution_method: self.attribution_method,
            timestamp: self.timestamp,
        }
    }
}

/// Outcome of inserting a payment under its idempotency key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInsert {
    Inserted(payments::Model),
    /// A payment with the same `(website_id, provider, provider_payment_id)`
    /// already exists; the stored row is returned untouched.
    Duplicate(payments::Model),
}

impl PaymentInsert {
    pub fn payment(&self) -> &payments::Model {
        match self {
            PaymentInsert::Inserted(p) | PaymentInsert::Duplicate(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGoalEvent {
    pub website_id: String,
    pub event: String,
    pub visitor_id: Option<String>,
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub value: Option<i64>,
    pub timestamp: UtcDateTime,
}

impl NewGoalEvent {
    pub(crate) fn into_model(self, id: i32) -> goal_events::Model {
        goal_events::Model {
            id,
            website_id: self.website_id,
            event: self.event,
            visitor_id: self.visitor_id,
            session_id: self.session_id,
            path: self.path,
            value: self.value,
            timestamp: self.timestamp,
        }
    }
}

/// Session duration in whole seconds for a continuation at `now`
pub(crate) fn continued_duration(first_visit_at: UtcDateTime, now: UtcDateTime) -> i64 {
    (now - first_visit_at).num_seconds().max(0)
}

/// Whether a session last seen at `last_seen_at` has outlived `ttl`
pub(crate) fn is_expired(
    last_seen_at: UtcDateTime,
    now: UtcDateTime,
    ttl: chrono::Duration,
) -> bool {
    last_seen_at + ttl < now
}
