use revtrail_core::AttributionConfig;
use revtrail_database::{EventStore, NewPayment, PaymentInsert};
use revtrail_entities::payments;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::PaymentError;
use crate::linker::PaymentLinker;
use crate::types::{PaymentEvent, PaymentOutcome};

pub struct PaymentService {
    store: Arc<dyn EventStore>,
    linker: PaymentLinker,
}

impl PaymentService {
    pub fn new(store: Arc<dyn EventStore>, config: &AttributionConfig) -> Self {
        Self {
            linker: PaymentLinker::new(store.clone(), config.window()),
            store,
        }
    }

    fn validate(event: &PaymentEvent) -> Result<(), PaymentError> {
        if event.provider.trim().is_empty() {
            return Err(PaymentError::Invalid("provider is empty".to_string()));
        }
        if event.provider_payment_id.trim().is_empty() {
            return Err(PaymentError::Invalid("provider payment id is empty".to_string()));
        }
        if event.currency.trim().is_empty() {
            return Err(PaymentError::Invalid("currency is empty".to_string()));
        }
        if event.amount < 0 {
            return Err(PaymentError::Invalid(format!(
                "negative amount {} for {}",
                event.amount, event.provider_payment_id
            )));
        }
        Ok(())
    }

    /// Store a payment once per `(website, provider, provider_payment_id)`.
    ///
    /// Attribution is decided on first delivery only. Redeliveries return the
    /// stored row unchanged.
    pub async fn ingest_payment(
        &self,
        website_id: &str,
        mut event: PaymentEvent,
    ) -> Result<PaymentOutcome, PaymentError> {
        Self::validate(&event)?;
        event.provider = event.provider.trim().to_string();
        event.provider_payment_id = event.provider_payment_id.trim().to_string();

        if let Some(existing) = self
            .store
            .find_payment(website_id, &event.provider, &event.provider_payment_id)
            .await?
        {
            debug!(
                website_id = %website_id,
                "Duplicate delivery of {}/{}",
                event.provider,
                event.provider_payment_id
            );
            return Ok(PaymentOutcome::Duplicate(existing));
        }

        let attribution = self.linker.link(&event, website_id).await?;
        if attribution.is_none() {
            warn!(
                website_id = %website_id,
                "Payment {}/{} could not be attributed",
                event.provider,
                event.provider_payment_id
            );
        }

        let metadata = if event.metadata.is_empty() {
            None
        } else {
            Some(event.metadata.to_json())
        };
        let payment = NewPayment {
            website_id: website_id.to_string(),
            provider: event.provider,
            provider_payment_id: event.provider_payment_id,
            amount: event.amount,
            currency: event.currency.trim().to_lowercase(),
            refunded: event.refunded,
            renewal: event.renewal,
            customer_email: event.customer_email,
            customer_id: event.customer_id,
            metadata,
            visitor_id: attribution.as_ref().map(|a| a.visitor_id.clone()),
            session_id: attribution.as_ref().and_then(|a| a.session_id.clone()),
            attribution_method: attribution.as_ref().map(|a| a.method.to_string()),
            timestamp: event.timestamp,
        };

        match self.store.insert_payment(payment).await? {
            PaymentInsert::Inserted(payment) => {
                info!(
                    website_id = %website_id,
                    payment_id = payment.id,
                    "Recorded payment of {} {} ({})",
                    payment.amount,
                    payment.currency,
                    payment.attribution_method.as_deref().unwrap_or("unattributed")
                );
                Ok(PaymentOutcome::Recorded {
                    payment,
                    attribution,
                })
            }
            // Lost a race with a concurrent delivery of the same payment
            PaymentInsert::Duplicate(existing) => Ok(PaymentOutcome::Duplicate(existing)),
        }
    }

    /// Flag a payment as refunded. Attribution is left as recorded.
    pub async fn mark_refunded(
        &self,
        website_id: &str,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<payments::Model, PaymentError> {
        let payment = self
            .store
            .set_payment_refunded(website_id, provider, provider_payment_id, true)
            .await?
            .ok_or_else(|| PaymentError::NotFound {
                provider: provider.to_string(),
                provider_payment_id: provider_payment_id.to_string(),
            })?;
        info!(website_id = %website_id, payment_id = payment.id, "Payment refunded");
        Ok(payment)
    }
}
