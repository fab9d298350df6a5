use chrono::Duration;
use revtrail_core::DateRange;
use revtrail_database::EventStore;
use std::sync::Arc;
use tracing::debug;

use crate::error::PaymentError;
use crate::types::{Attribution, AttributionMethod, PaymentEvent};

/// Links a payment to the visitor (and session) that most likely produced it.
///
/// Tiers are tried in order and the first hit wins:
/// 1. tracking ids carried in the payment metadata, trusted as given
/// 2. the customer email, matched against identified visitors
/// 3. the session seen most recently within `window` of the payment
pub struct PaymentLinker {
    store: Arc<dyn EventStore>,
    window: Duration,
}

impl PaymentLinker {
    pub fn new(store: Arc<dyn EventStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub async fn link(
        &self,
        event: &PaymentEvent,
        website_id: &str,
    ) -> Result<Option<Attribution>, PaymentError> {
        if let Some(attribution) = Self::from_metadata(event) {
            return Ok(Some(attribution));
        }
        if let Some(attribution) = self.from_email(event, website_id).await? {
            return Ok(Some(attribution));
        }
        self.from_timestamp(event, website_id).await
    }

    fn from_metadata(event: &PaymentEvent) -> Option<Attribution> {
        let visitor_id = event.metadata.visitor_id.clone()?;
        Some(Attribution {
            visitor_id,
            session_id: event.metadata.session_id.clone(),
            method: AttributionMethod::Metadata,
        })
    }

    async fn from_email(
        &self,
        event: &PaymentEvent,
        website_id: &str,
    ) -> Result<Option<Attribution>, PaymentError> {
        let Some(email) = event
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        else {
            return Ok(None);
        };

        let Some(visitor_id) = self.store.find_visitor_by_email(website_id, email).await? else {
            debug!(website_id = %website_id, "No identified visitor for payment email");
            return Ok(None);
        };

        let session_id = self
            .store
            .latest_session_for_visitor(website_id, &visitor_id)
            .await?
            .map(|s| s.session_id);

        Ok(Some(Attribution {
            visitor_id,
            session_id,
            method: AttributionMethod::Email,
        }))
    }

    async fn from_timestamp(
        &self,
        event: &PaymentEvent,
        website_id: &str,
    ) -> Result<Option<Attribution>, PaymentError> {
        let range = DateRange::around(event.timestamp, self.window);
        let session = self
            .store
            .latest_session_seen_between(website_id, range)
            .await?;

        Ok(session.map(|s| Attribution {
            visitor_id: s.visitor_id,
            session_id: Some(s.session_id),
            method: AttributionMethod::Timestamp,
        }))
    }
}
