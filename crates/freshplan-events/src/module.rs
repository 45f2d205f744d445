//! Module-scoped publishing.
//!
//! Application modules announce their own lifecycle events under
//! `module:{name}:{event}`, e.g. the customer form publishes
//! `module:customer:saved` and the tab navigation `module:tabs:switched`.

use crate::bus::{EventBus, Subscription};
use crate::handler::Handler;

/// Bus handle bound to one application module.
#[derive(Debug, Clone)]
pub struct ModuleEmitter {
    bus: EventBus,
    module: String,
}

impl ModuleEmitter {
    pub(crate) fn new(bus: EventBus, module: String) -> Self {
        Self { bus, module }
    }

    /// Module name, also used as the source label.
    pub fn name(&self) -> &str {
        &self.module
    }

    /// Full topic for one of this module's events.
    pub fn topic(&self, event: &str) -> String {
        format!("module:{}:{}", self.module, event)
    }

    /// Emit one of this module's events.
    pub fn emit(&self, event: &str, payload: serde_json::Value) {
        self.bus.emit_from(&self.module, &self.topic(event), payload);
    }

    /// Emit one of this module's events and wait for its handlers.
    pub async fn emit_async(&self, event: &str, payload: serde_json::Value) {
        self.bus
            .emit_async_from(&self.module, &self.topic(event), payload)
            .await;
    }

    /// Subscribe to one of this module's events.
    pub fn on(&self, event: &str, handler: Handler) -> Subscription {
        self.bus.on(&self.topic(event), handler)
    }

    /// The underlying bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
