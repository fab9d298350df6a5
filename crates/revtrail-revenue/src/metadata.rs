//! Typed view over provider payment metadata

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const VISITOR_KEYS: &[&str] = &["visitorId", "visitor_id"];
const SESSION_KEYS: &[&str] = &["sessionId", "session_id"];

/// Metadata attached to a payment by the checkout integration.
///
/// The tracking ids are typed; every other key is kept verbatim in `extra`
/// so new provider fields survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct PaymentMetadata {
    #[serde(rename = "visitorId", skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn id_value(value: Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn take_id(map: &mut serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    let mut found = None;
    for key in keys {
        if let Some(value) = map.remove(*key) {
            found = found.or_else(|| id_value(value));
        }
    }
    found
}

impl PaymentMetadata {
    /// Accepts camelCase or snake_case tracking keys. Anything that is not a
    /// JSON object yields empty metadata.
    pub fn from_json(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        let visitor_id = take_id(&mut map, VISITOR_KEYS);
        let session_id = take_id(&mut map, SESSION_KEYS);
        Self {
            visitor_id,
            session_id,
            extra: map.into_iter().collect(),
        }
    }

    pub fn with_visitor(mut self, visitor_id: impl Into<String>) -> Self {
        self.visitor_id = Some(visitor_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.visitor_id.is_none() && self.session_id.is_none() && self.extra.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Value> for PaymentMetadata {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}
