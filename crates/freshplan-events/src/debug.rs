//! Debug output for emissions.
//!
//! When debugging is switched on, the bus hands every emission to a
//! [`DebugSink`] before any handler runs.

use crate::types::EmittedEvent;

/// Receives one call per emission while debugging is enabled.
pub trait DebugSink: Send + Sync {
    /// Write a line for `event`.
    fn emitted(&self, event: &EmittedEvent);
}

/// Render the human-readable line for an emission.
pub fn format_line(event: &EmittedEvent) -> String {
    format!("[EventBus] {} {}", event.topic, event.payload)
}

/// Default sink, writes through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn emitted(&self, event: &EmittedEvent) {
        tracing::info!(
            topic = %event.topic,
            source = %event.source,
            event_id = %event.id,
            "{}",
            format_line(event)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let event = EmittedEvent::new("test:event", serde_json::json!({"data": "x"}), "tests");
        assert_eq!(format_line(&event), r#"[EventBus] test:event {"data":"x"}"#);
    }
}
