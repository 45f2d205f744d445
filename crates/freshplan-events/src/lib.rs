//! # FreshPlan Events
//!
//! This crate provides the in-process event bus that lets the FreshPlan
//! application modules (calculator, customer form, i18n, tab navigation)
//! talk to each other without holding references to each other.
//!
//! ## Overview
//!
//! The freshplan-events crate handles:
//! - **Subscriptions**: exact topics and `*`/`?` wildcard patterns, plain or once
//! - **Emission**: synchronous `emit` and awaited `emit_async`
//! - **Failure isolation**: failing handlers are reported on the `error` topic
//! - **History**: bounded record of recent emissions for diagnostics
//! - **Typed topics**: payload types bound to topic names
//!
//! ## Usage
//!
//! ### Subscribing and Emitting
//!
//! ```rust
//! use freshplan_events::{EventBus, Handler};
//!
//! let bus = EventBus::new();
//!
//! // Everything in the customer namespace
//! let sub = bus.on("customer:*", Handler::new(|delivery| {
//!     println!("{}: {}", delivery.topic, delivery.payload);
//!     Ok(())
//! }));
//!
//! bus.emit("customer:saved", serde_json::json!({"companyName": "Hotel Adler"}));
//!
//! sub.unsubscribe();
//! assert!(!bus.has_listeners("customer:saved"));
//! ```
//!
//! ### Typed Topics
//!
//! ```rust
//! use freshplan_events::{AppNavigate, EventBus};
//!
//! let bus = EventBus::new();
//! bus.on_topic(|AppNavigate(tab): AppNavigate| {
//!     println!("navigating to {}", tab);
//!     Ok(())
//! });
//!
//! bus.publish(&AppNavigate("profile".to_string())).unwrap();
//! ```
//!
//! ### Observing Failures
//!
//! ```rust
//! use freshplan_events::{EventBus, Handler, HandlerError, HandlerFailure, ERROR_TOPIC};
//!
//! let bus = EventBus::new();
//! bus.on(ERROR_TOPIC, Handler::new(|delivery| {
//!     if let Some(failure) = HandlerFailure::from_delivery(delivery) {
//!         eprintln!("{} failed on {}: {}", failure.handler, failure.topic, failure.error);
//!     }
//!     Ok(())
//! }));
//!
//! bus.on("calculator:updated", Handler::new(|_| Err(HandlerError::failed("bad input"))));
//! bus.emit("calculator:updated", serde_json::Value::Null);
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are colon-namespaced: `{domain}:{event}`.
//! - `calculator:updated` - Specific event
//! - `customer:*` - All customer events
//! - `*` - All events
//!
//! Wildcards:
//! - `*` matches any sequence of characters
//! - `?` matches exactly one character
//!
//! All other characters match literally.
//!
//! ## Reserved Topic
//!
//! `error` is published by the bus itself whenever a handler fails. Its
//! payload is a [`HandlerFailure`].

pub mod bus;
pub mod config;
pub mod debug;
pub mod error;
pub mod handler;
pub mod history;
pub mod module;
pub mod pattern;
mod registry;
pub mod types;

// Re-export main types
pub use bus::{EventBus, Subscription, BUS_SOURCE, ERROR_TOPIC};
pub use config::EventBusConfig;
pub use debug::{DebugSink, TracingSink};
pub use error::{
    ConfigError, EventBusError, EventBusResult, FailureKind, HandlerError, HandlerFailure,
    HandlerResult,
};
pub use handler::{Delivery, EventHandler, Handler, HandlerId};
pub use history::DEFAULT_HISTORY_CAPACITY;
pub use module::ModuleEmitter;
pub use pattern::TopicPattern;
pub use types::{
    AppNavigate, AppReset, CreditCheckRequired, CustomerCleared, CustomerSaved, EmittedEvent,
    Topic,
};
