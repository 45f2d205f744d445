//! Event bus implementation
//!
//! This module provides the in-process event bus shared by the application
//! modules: subscription handles, the two emission disciplines, failure
//! isolation and the emission history.

use crate::config::EventBusConfig;
use crate::debug::{DebugSink, TracingSink};
use crate::error::{EventBusResult, FailureKind, HandlerError, HandlerFailure, HandlerResult};
use crate::handler::{panic_message, Delivery, Handler, HandlerId, Invocation};
use crate::history::History;
use crate::module::ModuleEmitter;
use crate::registry::{Listener, Registry, SubscriptionId};
use crate::types::{EmittedEvent, Topic};
use futures::executor::block_on;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::task::noop_waker_ref;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// Reserved topic on which handler failures are published.
pub const ERROR_TOPIC: &str = "error";

/// Source label of the bus's own emissions.
pub const BUS_SOURCE: &str = "event-bus";

struct Shared {
    registry: RwLock<Registry>,
    history: Mutex<History>,
    debug: AtomicBool,
    sink: RwLock<Arc<dyn DebugSink>>,
    default_source: String,
}

/// Handle returned by `on`/`once`.
///
/// Dropping it keeps the subscription alive; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Clone)]
pub struct Subscription {
    id: Option<SubscriptionId>,
    topic: String,
    bus: Weak<Shared>,
}

impl Subscription {
    fn inactive(topic: &str) -> Self {
        Self {
            id: None,
            topic: topic.to_string(),
            bus: Weak::new(),
        }
    }

    /// Topic or pattern this subscription was registered under.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove exactly this subscription. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        let (Some(id), Some(shared)) = (self.id, self.bus.upgrade()) else {
            return;
        };
        if shared.registry.write().remove_id(&self.topic, id) {
            tracing::debug!(topic = %self.topic, subscription = ?id, "Handler unsubscribed");
        }
    }

    /// Whether the subscription is still registered.
    pub fn is_active(&self) -> bool {
        match (self.id, self.bus.upgrade()) {
            (Some(id), Some(shared)) => shared.registry.read().contains(&self.topic, id),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

/// In-process publish/subscribe bus.
///
/// Cloning is cheap and every clone talks to the same registry and history,
/// so the application builds one bus at startup and hands clones to its
/// modules.
///
/// # Example
///
/// ```rust
/// use freshplan_events::{EventBus, Handler};
///
/// let bus = EventBus::new();
/// let sub = bus.on("customer:*", Handler::new(|delivery| {
///     println!("customer event: {}", delivery.topic);
///     Ok(())
/// }));
///
/// bus.emit("customer:saved", serde_json::json!({"id": 1}));
/// sub.unsubscribe();
/// ```
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.shared.registry.read().len())
            .field("history", &self.shared.history.lock().len())
            .field("debug", &self.is_debug())
            .finish()
    }
}

impl EventBus {
    /// Create a new event bus with default configuration.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create with a custom history capacity.
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self::with_config(EventBusConfig::default().with_history_capacity(capacity))
    }

    /// Create from environment configuration.
    pub fn from_env() -> Self {
        Self::with_config(EventBusConfig::from_env())
    }

    /// Create from a configuration.
    ///
    /// The configuration is taken as given; a `history_capacity` of 0
    /// keeps no history. Run [`EventBusConfig::validate`] first to reject
    /// such values.
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(Registry::new()),
                history: Mutex::new(History::with_capacity(config.history_capacity)),
                debug: AtomicBool::new(config.debug),
                sink: RwLock::new(Arc::new(TracingSink)),
                default_source: config.default_source,
            }),
        }
    }

    /// Replace the debug sink.
    pub fn set_debug_sink(&self, sink: Arc<dyn DebugSink>) {
        *self.shared.sink.write() = sink;
    }

    // ------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------

    /// Subscribe a handler to a topic or wildcard pattern.
    ///
    /// An empty topic is rejected with a warning and yields an inactive
    /// subscription.
    pub fn on(&self, topic: &str, handler: Handler) -> Subscription {
        self.subscribe(topic, handler, None, false)
    }

    /// Subscribe with a calling context handed to every delivery.
    pub fn on_with_context(
        &self,
        topic: &str,
        handler: Handler,
        context: serde_json::Value,
    ) -> Subscription {
        self.subscribe(topic, handler, Some(context), false)
    }

    /// Subscribe a handler that runs at most once.
    pub fn once(&self, topic: &str, handler: Handler) -> Subscription {
        self.subscribe(topic, handler, None, true)
    }

    /// Subscribe once with a calling context.
    pub fn once_with_context(
        &self,
        topic: &str,
        handler: Handler,
        context: serde_json::Value,
    ) -> Subscription {
        self.subscribe(topic, handler, Some(context), true)
    }

    /// Subscribe to a typed topic.
    ///
    /// A payload that does not decode into `T` counts as a handler failure.
    pub fn on_topic<T, F>(&self, f: F) -> Subscription
    where
        T: Topic,
        F: Fn(T) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(T::NAME, Self::typed_handler(f))
    }

    /// Subscribe once to a typed topic.
    pub fn once_topic<T, F>(&self, f: F) -> Subscription
    where
        T: Topic,
        F: Fn(T) -> HandlerResult + Send + Sync + 'static,
    {
        self.once(T::NAME, Self::typed_handler(f))
    }

    fn typed_handler<T, F>(f: F) -> Handler
    where
        T: Topic,
        F: Fn(T) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::new(move |delivery| f(delivery.parse_payload::<T>()?))
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Handler,
        context: Option<serde_json::Value>,
        once: bool,
    ) -> Subscription {
        let handler_id = handler.id();
        let inserted = self.shared.registry.write().insert(topic, handler, context, once);

        match inserted {
            Ok(id) => {
                tracing::debug!(
                    topic = %topic,
                    handler = %handler_id,
                    once,
                    "Handler subscribed"
                );
                Subscription {
                    id: Some(id),
                    topic: topic.to_string(),
                    bus: Arc::downgrade(&self.shared),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Subscription rejected");
                Subscription::inactive(topic)
            }
        }
    }

    /// Remove subscriptions under exactly `topic`.
    ///
    /// Without a handler every subscription under that key goes; with one,
    /// only the subscriptions registered with that handler (or a clone of
    /// it), including once-subscriptions.
    pub fn off(&self, topic: &str, handler: Option<&Handler>) {
        let removed = self.shared.registry.write().remove(topic, handler);
        if removed > 0 {
            tracing::debug!(topic = %topic, removed, "Handlers unsubscribed");
        }
    }

    /// Remove every subscription and forget the history.
    pub fn clear(&self) {
        let mut registry = self.shared.registry.write();
        let mut history = self.shared.history.lock();
        registry.clear();
        history.clear();
        tracing::debug!("Event bus cleared");
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    /// Emit an event and run every matching handler before returning.
    ///
    /// Handler failures never reach the caller; they are published on
    /// [`ERROR_TOPIC`] as `handler-error`. Async handlers run until they
    /// first suspend; the rest continues on the current Tokio runtime
    /// without being awaited, or in place when there is no runtime.
    pub fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.emit_from(&self.shared.default_source, topic, payload);
    }

    /// Emit with an explicit source label.
    pub fn emit_from(&self, source: &str, topic: &str, payload: serde_json::Value) {
        let (listeners, payload) = self.begin(source, topic, payload);

        for listener in listeners {
            if !self.claim(&listener) {
                continue;
            }
            let handler_id = listener.handler.id();
            let delivery = Delivery {
                topic: topic.to_string(),
                payload: payload.clone(),
                context: listener.context,
            };

            match listener.handler.invoke(&delivery) {
                Invocation::Done(Ok(())) => {}
                Invocation::Done(Err(error)) => {
                    self.report_failure(FailureKind::HandlerError, topic, handler_id, error)
                }
                Invocation::Pending(fut) => self.start(topic, handler_id, fut),
            }
        }
    }

    /// Emit an event and wait until every matching handler has settled.
    ///
    /// Handlers are started in order and then driven concurrently. Each
    /// failure is published on [`ERROR_TOPIC`] as `async-handler-error`
    /// as soon as it settles.
    pub async fn emit_async(&self, topic: &str, payload: serde_json::Value) {
        self.emit_async_from(&self.shared.default_source, topic, payload)
            .await;
    }

    /// Emit asynchronously with an explicit source label.
    pub async fn emit_async_from(&self, source: &str, topic: &str, payload: serde_json::Value) {
        let (listeners, payload) = self.begin(source, topic, payload);
        let mut pending = FuturesUnordered::new();

        for listener in listeners {
            if !self.claim(&listener) {
                continue;
            }
            let handler_id = listener.handler.id();
            let delivery = Delivery {
                topic: topic.to_string(),
                payload: payload.clone(),
                context: listener.context,
            };

            match listener.handler.invoke(&delivery) {
                Invocation::Done(Ok(())) => {}
                Invocation::Done(Err(error)) => {
                    self.report_failure(FailureKind::AsyncHandlerError, topic, handler_id, error)
                }
                Invocation::Pending(fut) => {
                    pending.push(fut.map(move |result| (handler_id, result)));
                }
            }
        }

        while let Some((handler_id, result)) = pending.next().await {
            if let Err(error) = result {
                self.report_failure(FailureKind::AsyncHandlerError, topic, handler_id, error);
            }
        }
    }

    /// Publish a typed event.
    pub fn publish<T: Topic>(&self, event: &T) -> EventBusResult<()> {
        let payload = serde_json::to_value(event)?;
        self.emit(T::NAME, payload);
        Ok(())
    }

    /// Publish a typed event and wait for its handlers.
    pub async fn publish_async<T: Topic>(&self, event: &T) -> EventBusResult<()> {
        let payload = serde_json::to_value(event)?;
        self.emit_async(T::NAME, payload).await;
        Ok(())
    }

    /// Record the emission and snapshot its listeners.
    fn begin(
        &self,
        source: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> (Vec<Listener>, serde_json::Value) {
        let event = EmittedEvent::new(topic, payload, source);

        if self.is_debug() {
            let sink = self.shared.sink.read().clone();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sink.emitted(&event))) {
                tracing::warn!(
                    topic = %topic,
                    error = %panic_message(panic),
                    "Debug sink panicked"
                );
            }
        }

        let listeners = self.shared.registry.read().resolve(topic);
        tracing::trace!(
            topic = %topic,
            source = %source,
            handlers = listeners.len(),
            "Dispatching event"
        );

        let payload = event.payload.clone();
        self.shared.history.lock().record(event);
        (listeners, payload)
    }

    /// Once-listeners are removed before they run; a listener that is
    /// already gone is skipped.
    fn claim(&self, listener: &Listener) -> bool {
        !listener.once || self.shared.registry.write().remove_id(&listener.key, listener.id)
    }

    /// Run an async handler reached by `emit` up to its first suspension
    /// point. The remainder is spawned on the current Tokio runtime, or
    /// driven to completion in place when there is none.
    fn start(
        &self,
        topic: &str,
        handler: HandlerId,
        mut fut: BoxFuture<'static, HandlerResult>,
    ) {
        let mut cx = Context::from_waker(noop_waker_ref());
        let result = match fut.as_mut().poll(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let bus = self.clone();
                    let topic = topic.to_string();
                    runtime.spawn(async move {
                        if let Err(error) = fut.await {
                            bus.report_failure(FailureKind::HandlerError, &topic, handler, error);
                        }
                    });
                    return;
                }
                Err(_) => {
                    tracing::trace!(
                        topic = %topic,
                        handler = %handler,
                        "No Tokio runtime, blocking on async handler"
                    );
                    block_on(fut)
                }
            },
        };

        if let Err(error) = result {
            self.report_failure(FailureKind::HandlerError, topic, handler, error);
        }
    }

    fn report_failure(
        &self,
        kind: FailureKind,
        topic: &str,
        handler: HandlerId,
        error: HandlerError,
    ) {
        if topic == ERROR_TOPIC {
            tracing::warn!(
                handler = %handler,
                kind = kind.as_str(),
                error = %error,
                "Error handler failed, dropping secondary failure"
            );
            return;
        }

        tracing::warn!(
            topic = %topic,
            handler = %handler,
            kind = kind.as_str(),
            error = %error,
            "Handler failed"
        );

        let failure = HandlerFailure {
            kind,
            error: error.to_string(),
            handler,
            topic: topic.to_string(),
        };
        match serde_json::to_value(&failure) {
            Ok(payload) => self.emit_from(BUS_SOURCE, ERROR_TOPIC, payload),
            Err(e) => tracing::warn!(error = %e, "Failed to encode handler failure"),
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Copy of the recorded emissions, oldest first.
    pub fn history(&self) -> Vec<EmittedEvent> {
        self.shared.history.lock().snapshot()
    }

    /// Switch the debug sink on or off.
    pub fn set_debug(&self, enabled: bool) {
        self.shared.debug.store(enabled, Ordering::Relaxed);
    }

    /// Whether the debug sink is on.
    pub fn is_debug(&self) -> bool {
        self.shared.debug.load(Ordering::Relaxed)
    }

    /// Every topic and pattern with at least one subscription.
    pub fn registered_events(&self) -> Vec<String> {
        self.shared.registry.read().keys()
    }

    /// Whether an emission to `topic` would reach any handler.
    pub fn has_listeners(&self, topic: &str) -> bool {
        self.listener_count(topic) > 0
    }

    /// Number of handlers an emission to `topic` would reach.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.shared.registry.read().count(topic)
    }

    /// Handle for a named application module.
    pub fn module(&self, name: impl Into<String>) -> ModuleEmitter {
        ModuleEmitter::new(self.clone(), name.into())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
