//! SQL-backed event store

use async_trait::async_trait;
use chrono::Duration;
use revtrail_core::{DateRange, UtcDateTime};
use revtrail_entities::{goal_events, page_views, payments, sessions, visitor_identities};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::connection::DbConnection;
use crate::error::StoreError;
use crate::models::{
    continued_duration, is_expired, NewGoalEvent, NewPageView, NewPayment, NewSession,
    PaymentInsert, SessionWrite,
};
use crate::store::EventStore;

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub struct SeaOrmEventStore {
    db: Arc<DbConnection>,
}

impl SeaOrmEventStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DbConnection {
        self.db.as_ref()
    }

    /// Advances an existing session, guarded on it still being fresh so a
    /// concurrent reader cannot revive an expired row.
    async fn continue_session(
        &self,
        existing: sessions::Model,
        now: UtcDateTime,
        ttl: Duration,
    ) -> Result<SessionWrite, StoreError> {
        if is_expired(existing.last_seen_at, now, ttl) {
            return Ok(SessionWrite::Expired(existing));
        }

        let result = sessions::Entity::update_many()
            .col_expr(
                sessions::Column::PageViews,
                Expr::col(sessions::Column::PageViews).add(1),
            )
            .col_expr(sessions::Column::Bounce, Expr::value(false))
            .col_expr(sessions::Column::LastSeenAt, Expr::value(now))
            .col_expr(
                sessions::Column::Duration,
                Expr::value(continued_duration(existing.first_visit_at, now)),
            )
            .filter(sessions::Column::Id.eq(existing.id))
            .filter(sessions::Column::LastSeenAt.gte(now - ttl))
            .exec(self.db.as_ref())
            .await?;

        let current = sessions::Entity::find_by_id(existing.id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| StoreError::Missing(format!("session {}", existing.session_id)))?;

        if result.rows_affected == 0 {
            return Ok(SessionWrite::Expired(current));
        }
        Ok(SessionWrite::Continued(current))
    }
}

#[async_trait]
impl EventStore for SeaOrmEventStore {
    async fn upsert_session(
        &self,
        session: NewSession,
        now: UtcDateTime,
        ttl: Duration,
    ) -> Result<SessionWrite, StoreError> {
        if let Some(existing) = self
            .find_session(&session.website_id, &session.session_id)
            .await?
        {
            return self.continue_session(existing, now, ttl).await;
        }

        let website_id = session.website_id.clone();
        let session_id = session.session_id.clone();
        let model = sessions::ActiveModel {
            website_id: Set(session.website_id),
            session_id: Set(session.session_id),
            visitor_id: Set(session.visitor_id),
            first_visit_at: Set(now),
            last_seen_at: Set(now),
            page_views: Set(1),
            duration: Set(0),
            bounce: Set(true),
            referrer: Set(session.referrer),
            referrer_domain: Set(session.referrer_domain),
            utm_source: Set(session.utm_source),
            utm_medium: Set(session.utm_medium),
            utm_campaign: Set(session.utm_campaign),
            utm_term: Set(session.utm_term),
            utm_content: Set(session.utm_content),
            landing_path: Set(session.landing_path),
            device: Set(session.device),
            browser: Set(session.browser),
            os: Set(session.os),
            country: Set(session.country),
            region: Set(session.region),
            city: Set(session.city),
            ..Default::default()
        };

        match model.insert(self.db.as_ref()).await {
            Ok(created) => Ok(SessionWrite::Created(created)),
            Err(err) if is_unique_violation(&err) => {
                // Lost the creation race to a concurrent beacon
                debug!(
                    website_id = %website_id,
                    session_id = %session_id,
                    "Session created concurrently, continuing it"
                );
                let existing = self
                    .find_session(&website_id, &session_id)
                    .await?
                    .ok_or_else(|| StoreError::Missing(format!("session {}", session_id)))?;
                self.continue_session(existing, now, ttl).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_page_view(
        &self,
        page_view: NewPageView,
    ) -> Result<page_views::Model, StoreError> {
        let model = page_views::ActiveModel {
            website_id: Set(page_view.website_id),
            session_id: Set(page_view.session_id),
            visitor_id: Set(page_view.visitor_id),
            timestamp: Set(page_view.timestamp),
            path: Set(page_view.path),
            hostname: Set(page_view.hostname),
            title: Set(page_view.title),
            referrer: Set(page_view.referrer),
            referrer_domain: Set(page_view.referrer_domain),
            referrer_path: Set(page_view.referrer_path),
            utm_source: Set(page_view.utm_source),
            utm_medium: Set(page_view.utm_medium),
            utm_campaign: Set(page_view.utm_campaign),
            utm_term: Set(page_view.utm_term),
            utm_content: Set(page_view.utm_content),
            device: Set(page_view.device),
            browser: Set(page_view.browser),
            os: Set(page_view.os),
            country: Set(page_view.country),
            region: Set(page_view.region),
            city: Set(page_view.city),
            ..Default::default()
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    async fn find_session(
        &self,
        website_id: &str,
        session_id: &str,
    ) -> Result<Option<sessions::Model>, StoreError> {
        Ok(sessions::Entity::find()
            .filter(sessions::Column::WebsiteId.eq(website_id))
            .filter(sessions::Column::SessionId.eq(session_id))
            .one(self.db.as_ref())
            .await?)
    }

    async fn sessions_started_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<sessions::Model>, StoreError> {
        Ok(sessions::Entity::find()
            .filter(sessions::Column::WebsiteId.eq(website_id))
            .filter(sessions::Column::FirstVisitAt.between(range.start, range.end))
            .order_by_asc(sessions::Column::FirstVisitAt)
            .order_by_asc(sessions::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    async fn sessions_seen_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<sessions::Model>, StoreError> {
        Ok(sessions::Entity::find()
            .filter(sessions::Column::WebsiteId.eq(website_id))
            .filter(sessions::Column::LastSeenAt.between(range.start, range.end))
            .order_by_desc(sessions::Column::LastSeenAt)
            .order_by_desc(sessions::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    async fn latest_session_seen_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Option<sessions::Model>, StoreError> {
        Ok(sessions::Entity::find()
            .filter(sessions::Column::WebsiteId.eq(website_id))
            .filter(sessions::Column::LastSeenAt.between(range.start, range.end))
            .order_by_desc(sessions::Column::LastSeenAt)
            .order_by_desc(sessions::Column::Id)
            .one(self.db.as_ref())
            .await?)
    }

    async fn latest_session_for_visitor(
        &self,
        website_id: &str,
        visitor_id: &str,
    ) -> Result<Option<sessions::Model>, StoreError> {
        Ok(sessions::Entity::find()
            .filter(sessions::Column::WebsiteId.eq(website_id))
            .filter(sessions::Column::VisitorId.eq(visitor_id))
            .order_by_desc(sessions::Column::LastSeenAt)
            .order_by_desc(sessions::Column::Id)
            .one(self.db.as_ref())
            .await?)
    }

    async fn sessions_by_ids(
        &self,
        website_id: &str,
        session_ids: &[String],
    ) -> Result<Vec<sessions::Model>, StoreError> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sessions::Entity::find()
            .filter(sessions::Column::WebsiteId.eq(website_id))
            .filter(sessions::Column::SessionId.is_in(session_ids.iter().cloned()))
            .order_by_asc(sessions::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    async fn page_views_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<page_views::Model>, StoreError> {
        Ok(page_views::Entity::find()
            .filter(page_views::Column::WebsiteId.eq(website_id))
            .filter(page_views::Column::Timestamp.between(range.start, range.end))
            .order_by_asc(page_views::Column::Timestamp)
            .order_by_asc(page_views::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    async fn latest_page_views_for_sessions(
        &self,
        website_id: &str,
        session_ids: &[String],
    ) -> Result<HashMap<String, page_views::Model>, StoreError> {
        if session_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = page_views::Entity::find()
            .filter(page_views::Column::WebsiteId.eq(website_id))
            .filter(page_views::Column::SessionId.is_in(session_ids.iter().cloned()))
            .order_by_asc(page_views::Column::Timestamp)
            .order_by_asc(page_views::Column::Id)
            .all(self.db.as_ref())
            .await?;

        let mut latest = HashMap::new();
        for row in rows {
            latest.insert(row.session_id.clone(), row);
        }
        Ok(latest)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentInsert, StoreError> {
        if let Some(existing) = self
            .find_payment(
                &payment.website_id,
                &payment.provider,
                &payment.provider_payment_id,
            )
            .await?
        {
            return Ok(PaymentInsert::Duplicate(existing));
        }

        let (website_id, provider, provider_payment_id) = (
            payment.website_id.clone(),
            payment.provider.clone(),
            payment.provider_payment_id.clone(),
        );
        let model = payments::ActiveModel {
            website_id: Set(payment.website_id),
            provider: Set(payment.provider),
            provider_payment_id: Set(payment.provider_payment_id),
            amount: Set(payment.amount),
            currency: Set(payment.currency),
            refunded: Set(payment.refunded),
            renewal: Set(payment.renewal),
            customer_email: Set(payment.customer_email),
            customer_id: Set(payment.customer_id),
            metadata: Set(payment.metadata),
            visitor_id: Set(payment.visitor_id),
            session_id: Set(payment.session_id),
            attribution_method: Set(payment.attribution_method),
            timestamp: Set(payment.timestamp),
            ..Default::default()
        };

        match model.insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(PaymentInsert::Inserted(inserted)),
            Err(err) if is_unique_violation(&err) => {
                let existing = self
                    .find_payment(&website_id, &provider, &provider_payment_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Missing(format!("payment {}/{}", provider, provider_payment_id))
                    })?;
                Ok(PaymentInsert::Duplicate(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_payment(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<payments::Model>, StoreError> {
        Ok(payments::Entity::find()
            .filter(payments::Column::WebsiteId.eq(website_id))
            .filter(payments::Column::Provider.eq(provider))
            .filter(payments::Column::ProviderPaymentId.eq(provider_payment_id))
            .one(self.db.as_ref())
            .await?)
    }

    async fn set_payment_refunded(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
        refunded: bool,
    ) -> Result<Option<payments::Model>, StoreError> {
        payments::Entity::update_many()
            .col_expr(payments::Column::Refunded, Expr::value(refunded))
            .filter(payments::Column::WebsiteId.eq(website_id))
            .filter(payments::Column::Provider.eq(provider))
            .filter(payments::Column::ProviderPaymentId.eq(provider_payment_id))
            .exec(self.db.as_ref())
            .await?;

        self.find_payment(website_id, provider, provider_payment_id)
            .await
    }

    async fn payments_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<payments::Model>, StoreError> {
        Ok(payments::Entity::find()
            .filter(payments::Column::WebsiteId.eq(website_id))
            .filter(payments::Column::Timestamp.between(range.start, range.end))
            .order_by_asc(payments::Column::Timestamp)
            .order_by_asc(payments::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    async fn insert_goal_event(
        &self,
        goal: NewGoalEvent,
    ) -> Result<goal_events::Model, StoreError> {
        let model = goal_events::ActiveModel {
            website_id: Set(goal.website_id),
            event: Set(goal.event),
            visitor_id: Set(goal.visitor_id),
            session_id: Set(goal.session_id),
            path: Set(goal.path),
            value: Set(goal.value),
            timestamp: Set(goal.timestamp),
            ..Default::default()
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    async fn goal_events_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<goal_events::Model>, StoreError> {
        Ok(goal_events::Entity::find()
            .filter(goal_events::Column::WebsiteId.eq(website_id))
            .filter(goal_events::Column::Timestamp.between(range.start, range.end))
            .order_by_asc(goal_events::Column::Timestamp)
            .order_by_asc(goal_events::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    async fn upsert_visitor_identity(
        &self,
        website_id: &str,
        visitor_id: &str,
        email: &str,
        now: UtcDateTime,
    ) -> Result<visitor_identities::Model, StoreError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(StoreError::Invalid("empty email".to_string()));
        }

        let find_existing = || {
            visitor_identities::Entity::find()
                .filter(visitor_identities::Column::WebsiteId.eq(website_id))
                .filter(visitor_identities::Column::VisitorId.eq(visitor_id))
                .filter(visitor_identities::Column::Email.eq(email.as_str()))
                .one(self.db.as_ref())
        };

        if let Some(existing) = find_existing().await? {
            let mut active: visitor_identities::ActiveModel = existing.into();
            active.identified_at = Set(now);
            return Ok(active.update(self.db.as_ref()).await?);
        }

        let model = visitor_identities::ActiveModel {
            website_id: Set(website_id.to_string()),
            visitor_id: Set(visitor_id.to_string()),
            email: Set(email.clone()),
            identified_at: Set(now),
            ..Default::default()
        };

        match model.insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(inserted),
            Err(err) if is_unique_violation(&err) => find_existing()
                .await?
                .ok_or_else(|| StoreError::Missing(format!("visitor identity {}", visitor_id))),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_visitor_by_email(
        &self,
        website_id: &str,
        email: &str,
    ) -> Result<Option<String>, StoreError> {
        let identity = visitor_identities::Entity::find()
            .filter(visitor_identities::Column::WebsiteId.eq(website_id))
            .filter(visitor_identities::Column::Email.eq(email.trim().to_lowercase()))
            .order_by_desc(visitor_identities::Column::IdentifiedAt)
            .order_by_desc(visitor_identities::Column::Id)
            .one(self.db.as_ref())
            .await?;
        Ok(identity.map(|i| i.visitor_id))
    }
}
