//! Error types for the event bus
//!
//! This module defines the errors a handler can report, the errors the bus
//! returns from its few fallible helpers, and the payload that the bus
//! publishes on the reserved `error` topic when a handler fails.

use crate::handler::{Delivery, HandlerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event bus error types.
///
/// Subscription and emission never surface these to publishers; they are
/// returned only by helpers that have a genuine failure mode.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Subscription key is empty or cannot be compiled
    #[error("Invalid topic pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected key.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Typed payload could not be serialized
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Error reported by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler reported a failure
    #[error("{0}")]
    Failed(String),

    /// Handler panicked while running
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Payload did not decode into the handler's expected type
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl HandlerError {
    /// Create a failure from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Result type returned by handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Which emission discipline a failure happened under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Handler failed during `emit`
    HandlerError,
    /// Handler failed during `emit_async`
    AsyncHandlerError,
}

impl FailureKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::HandlerError => "handler-error",
            FailureKind::AsyncHandlerError => "async-handler-error",
        }
    }
}

/// Payload published on the `error` topic when a handler fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Failure discipline
    pub kind: FailureKind,
    /// Rendered handler error
    pub error: String,
    /// Identity of the failing handler
    pub handler: HandlerId,
    /// Topic whose dispatch failed
    pub topic: String,
}

impl HandlerFailure {
    /// Decode a failure from an `error` topic delivery.
    ///
    /// Returns `None` when the payload was published by someone other than
    /// the bus and does not have the failure shape.
    pub fn from_delivery(delivery: &Delivery) -> Option<Self> {
        delivery.parse_payload().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(FailureKind::HandlerError).unwrap(),
            serde_json::json!("handler-error")
        );
        assert_eq!(
            serde_json::to_value(FailureKind::AsyncHandlerError).unwrap(),
            serde_json::json!("async-handler-error")
        );
        assert_eq!(FailureKind::AsyncHandlerError.as_str(), "async-handler-error");
    }

    #[test]
    fn test_handler_error_display() {
        assert_eq!(HandlerError::failed("boom").to_string(), "boom");
        assert_eq!(
            HandlerError::Panicked("oops".to_string()).to_string(),
            "Handler panicked: oops"
        );
    }

    #[test]
    fn test_invalid_pattern_display() {
        let err = EventBusError::InvalidPattern {
            pattern: String::new(),
            reason: "empty".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid topic pattern '': empty");
    }
}
