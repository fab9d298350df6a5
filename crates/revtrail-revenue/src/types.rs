use revtrail_core::UtcDateTime;
use revtrail_entities::payments;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::metadata::PaymentMetadata;

/// A payment as reported by a provider webhook or sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub provider: String,
    pub provider_payment_id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub renewal: bool,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub metadata: PaymentMetadata,
    pub timestamp: UtcDateTime,
}

impl PaymentEvent {
    pub fn new(
        provider: impl Into<String>,
        provider_payment_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
        timestamp: UtcDateTime,
    ) -> Self {
        Self {
            provider: provider.into(),
            provider_payment_id: provider_payment_id.into(),
            amount,
            currency: currency.into(),
            refunded: false,
            renewal: false,
            customer_email: None,
            customer_id: None,
            metadata: PaymentMetadata::default(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionMethod {
    /// Ids passed through checkout metadata
    Metadata,
    /// Customer email matched an identified visitor
    Email,
    /// Most recent session active near the payment time
    Timestamp,
}

impl AttributionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionMethod::Metadata => "metadata",
            AttributionMethod::Email => "email",
            AttributionMethod::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttributionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(AttributionMethod::Metadata),
            "email" => Ok(AttributionMethod::Email),
            "timestamp" => Ok(AttributionMethod::Timestamp),
            other => Err(format!("unknown attribution method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub visitor_id: String,
    pub session_id: Option<String>,
    pub method: AttributionMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Stored for the first time; attribution is `None` when no tier matched
    Recorded {
        payment: payments::Model,
        attribution: Option<Attribution>,
    },
    /// Already stored under the same provider id; nothing was changed
    Duplicate(payments::Model),
}

impl PaymentOutcome {
    pub fn payment(&self) -> &payments::Model {
        match self {
            PaymentOutcome::Recorded { payment, .. } | PaymentOutcome::Duplicate(payment) => payment,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PaymentOutcome::Duplicate(_))
    }
}
