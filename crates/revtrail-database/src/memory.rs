//! In-process event store, used by tests and embedded deployments

use async_trait::async_trait;
use chrono::Duration;
use revtrail_core::{DateRange, UtcDateTime};
use revtrail_entities::{goal_events, page_views, payments, sessions, visitor_identities};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{
    continued_duration, is_expired, NewGoalEvent, NewPageView, NewPayment, NewSession,
    PaymentInsert, SessionWrite,
};
use crate::store::EventStore;

#[derive(Default)]
struct MemoryState {
    sessions: Vec<sessions::Model>,
    /// `(website_id, session_id)` -> index into `sessions`
    session_index: HashMap<(String, String), usize>,
    page_views: Vec<page_views::Model>,
    payments: Vec<payments::Model>,
    /// `(website_id, provider, provider_payment_id)` -> index into `payments`
    payment_index: HashMap<(String, String, String), usize>,
    goal_events: Vec<goal_events::Model>,
    identities: Vec<visitor_identities::Model>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Event store kept in memory behind a single async `RwLock`.
///
/// Every write takes the write lock for its whole read-modify-write, which
/// makes session upserts and payment inserts atomic.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_by_last_seen_desc(rows: &mut [sessions::Model]) {
    rows.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn upsert_session(
        &self,
        session: NewSession,
        now: UtcDateTime,
        ttl: Duration,
    ) -> Result<SessionWrite, StoreError> {
        let mut state = self.state.write().await;
        let key = (session.website_id.clone(), session.session_id.clone());

        if let Some(&idx) = state.session_index.get(&key) {
            let existing = &mut state.sessions[idx];
            if is_expired(existing.last_seen_at, now, ttl) {
                return Ok(SessionWrite::Expired(existing.clone()));
            }
            existing.page_views += 1;
            existing.bounce = false;
            existing.last_seen_at = now;
            existing.duration = continued_duration(existing.first_visit_at, now);
            return Ok(SessionWrite::Continued(existing.clone()));
        }

        let id = state.next_id();
        let created = session.into_model(id, now);
        state.sessions.push(created.clone());
        let idx = state.sessions.len() - 1;
        state.session_index.insert(key, idx);
        Ok(SessionWrite::Created(created))
    }

    async fn insert_page_view(
        &self,
        page_view: NewPageView,
    ) -> Result<page_views::Model, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let model = page_view.into_model(id);
        state.page_views.push(model.clone());
        Ok(model)
    }

    async fn find_session(
        &self,
        website_id: &str,
        session_id: &str,
    ) -> Result<Option<sessions::Model>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .session_index
            .get(&(website_id.to_string(), session_id.to_string()))
            .map(|&idx| state.sessions[idx].clone()))
    }

    async fn sessions_started_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<sessions::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| s.website_id == website_id && range.contains(s.first_visit_at))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.first_visit_at.cmp(&b.first_visit_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn sessions_seen_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<sessions::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| s.website_id == website_id && range.contains(s.last_seen_at))
            .cloned()
            .collect();
        sort_by_last_seen_desc(&mut rows);
        Ok(rows)
    }

    async fn latest_session_seen_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Option<sessions::Model>, StoreError> {
        Ok(self
            .sessions_seen_between(website_id, range)
            .await?
            .into_iter()
            .next())
    }

    async fn latest_session_for_visitor(
        &self,
        website_id: &str,
        visitor_id: &str,
    ) -> Result<Option<sessions::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| s.website_id == website_id && s.visitor_id == visitor_id)
            .cloned()
            .collect();
        sort_by_last_seen_desc(&mut rows);
        Ok(rows.into_iter().next())
    }

    async fn sessions_by_ids(
        &self,
        website_id: &str,
        session_ids: &[String],
    ) -> Result<Vec<sessions::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = session_ids
            .iter()
            .filter_map(|sid| {
                state
                    .session_index
                    .get(&(website_id.to_string(), sid.clone()))
                    .map(|&idx| state.sessions[idx].clone())
            })
            .collect();
        rows.sort_by_key(|s| s.id);
        rows.dedup_by_key(|s| s.id);
        Ok(rows)
    }

    async fn page_views_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<page_views::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .page_views
            .iter()
            .filter(|p| p.website_id == website_id && range.contains(p.timestamp))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn latest_page_views_for_sessions(
        &self,
        website_id: &str,
        session_ids: &[String],
    ) -> Result<HashMap<String, page_views::Model>, StoreError> {
        let state = self.state.read().await;
        let mut latest: HashMap<String, page_views::Model> = HashMap::new();
        for pv in state
            .page_views
            .iter()
            .filter(|p| p.website_id == website_id && session_ids.contains(&p.session_id))
        {
            let newer = latest
                .get(&pv.session_id)
                .map(|cur| (pv.timestamp, pv.id) > (cur.timestamp, cur.id))
                .unwrap_or(true);
            if newer {
                latest.insert(pv.session_id.clone(), pv.clone());
            }
        }
        Ok(latest)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentInsert, StoreError> {
        let mut state = self.state.write().await;
        let key = (
            payment.website_id.clone(),
            payment.provider.clone(),
            payment.provider_payment_id.clone(),
        );
        if let Some(&idx) = state.payment_index.get(&key) {
            return Ok(PaymentInsert::Duplicate(state.payments[idx].clone()));
        }

        let id = state.next_id();
        let model = payment.into_model(id);
        state.payments.push(model.clone());
        let idx = state.payments.len() - 1;
        state.payment_index.insert(key, idx);
        Ok(PaymentInsert::Inserted(model))
    }

    async fn find_payment(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<payments::Model>, StoreError> {
        let state = self.state.read().await;
        let key = (
            website_id.to_string(),
            provider.to_string(),
            provider_payment_id.to_string(),
        );
        Ok(state
            .payment_index
            .get(&key)
            .map(|&idx| state.payments[idx].clone()))
    }

    async fn set_payment_refunded(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
        refunded: bool,
    ) -> Result<Option<payments::Model>, StoreError> {
        let mut state = self.state.write().await;
        let key = (
            website_id.to_string(),
            provider.to_string(),
            provider_payment_id.to_string(),
        );
        let Some(&idx) = state.payment_index.get(&key) else {
            return Ok(None);
        };
        let payment = &mut state.payments[idx];
        payment.refunded = refunded;
        Ok(Some(payment.clone()))
    }

    async fn payments_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<payments::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .payments
            .iter()
            .filter(|p| p.website_id == website_id && range.contains(p.timestamp))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn insert_goal_event(
        &self,
        goal: NewGoalEvent,
    ) -> Result<goal_events::Model, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let model = goal.into_model(id);
        state.goal_events.push(model.clone());
        Ok(model)
    }

    async fn goal_events_between(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<goal_events::Model>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .goal_events
            .iter()
            .filter(|g| g.website_id == website_id && range.contains(g.timestamp))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(rows)
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

        let mut state = self.state.write().await;
        if let Some(existing) = state.identities.iter_mut().find(|i| {
            i.website_id == website_id && i.visitor_id == visitor_id && i.email == email
        }) {
            existing.identified_at = now;
            return Ok(existing.clone());
        }

        let id = state.next_id();
        let model = visitor_identities::Model {
            id,
            website_id: website_id.to_string(),
            visitor_id: visitor_id.to_string(),
            email,
            identified_at: now,
        };
        state.identities.push(model.clone());
        Ok(model)
    }

    async fn find_visitor_by_email(
        &self,
        website_id: &str,
        email: &str,
    ) -> Result<Option<String>, StoreError> {
        let email = email.trim().to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .identities
            .iter()
            .filter(|i| i.website_id == website_id && i.email == email)
            .max_by(|a, b| a.identified_at.cmp(&b.identified_at).then(a.id.cmp(&b.id)))
            .map(|i| i.visitor_id.clone()))
    }
}
