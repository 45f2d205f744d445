//! Event types
//!
//! This module defines the record the bus keeps for every emission and the
//! typed topics the application modules publish to each other.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of one emission.
///
/// Created once per `emit`/`emit_async` call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    /// Unique event ID
    pub id: Uuid,

    /// Emitted topic (e.g., "customer:saved")
    pub topic: String,

    /// Event payload
    pub payload: serde_json::Value,

    /// Emission start, serialized as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Label supplied by the publisher
    pub source: String,
}

impl EmittedEvent {
    /// Create a new event stamped with the current time.
    pub fn new(
        topic: impl Into<String>,
        payload: serde_json::Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    /// Emission time in epoch milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// A payload type bound to exactly one topic name.
///
/// This is the compile-time map from topic to payload: publishing a value
/// picks its topic, and subscribing with a type decodes the payload.
pub trait Topic: Serialize + DeserializeOwned + Send + 'static {
    /// Topic name (e.g., "customer:saved")
    const NAME: &'static str;
}

// ============================================================================
// Customer Events
// ============================================================================

/// Customer record was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSaved {
    /// Saved customer data
    pub customer: serde_json::Value,
    /// Save time in epoch milliseconds
    pub timestamp: i64,
}

impl Topic for CustomerSaved {
    const NAME: &'static str = "customer:saved";
}

/// All customer data was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCleared;

impl Topic for CustomerCleared {
    const NAME: &'static str = "customer:cleared";
}

/// New customer paying by invoice needs a credit check first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCheckRequired {
    /// Customer data under review
    pub customer: serde_json::Value,
    /// Message shown to the salesperson
    pub message: String,
}

impl Topic for CreditCheckRequired {
    const NAME: &'static str = "customer:creditCheckRequired";
}

// ============================================================================
// Application Events
// ============================================================================

/// All forms should reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppReset;

impl Topic for AppReset {
    const NAME: &'static str = "app:reset";
}

/// Request to navigate to a tab (e.g., "profile").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppNavigate(pub String);

impl Topic for AppNavigate {
    const NAME: &'static str = "app:navigate";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = EmittedEvent::new("test:event", serde_json::json!({"data": "x"}), "tests");

        assert_eq!(event.topic, "test:event");
        assert_eq!(event.source, "tests");
        assert_eq!(event.payload["data"], "x");
    }

    #[test]
    fn test_timestamp_serializes_as_millis() {
        let event = EmittedEvent::new("test:event", serde_json::Value::Null, "tests");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["timestamp"], serde_json::json!(event.timestamp_millis()));

        let back: EmittedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.timestamp_millis(), event.timestamp_millis());
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(CustomerSaved::NAME, "customer:saved");
        assert_eq!(CreditCheckRequired::NAME, "customer:creditCheckRequired");
        assert_eq!(AppNavigate::NAME, "app:navigate");
    }

    #[test]
    fn test_navigate_payload_is_plain_string() {
        let json = serde_json::to_value(AppNavigate("profile".to_string())).unwrap();
        assert_eq!(json, serde_json::json!("profile"));
    }
}
