//! Handlers and deliveries
//!
//! A [`Handler`] is the callable registered on the bus. It is either
//! synchronous (runs to completion inside the emitting call) or
//! asynchronous (produces a future that `emit_async` awaits).
//! Clones of a handler share its [`HandlerId`], which is how `off`
//! finds it again and how failures name it.

use crate::error::{HandlerError, HandlerResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity shared by a handler and all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// What a handler receives for one emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The concrete topic that was emitted
    pub topic: String,
    /// Event payload
    pub payload: serde_json::Value,
    /// Calling context stored with the subscription
    pub context: Option<serde_json::Value>,
}

impl Delivery {
    /// Parse the payload into a specific type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Async event handler trait.
///
/// Implement this for handlers that carry their own state; wrap them with
/// [`Handler::from_event_handler`] to register them.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one delivery.
    async fn handle(&self, delivery: Delivery) -> HandlerResult;
}

type SyncCallback = dyn Fn(&Delivery) -> HandlerResult + Send + Sync;
type AsyncCallback = dyn Fn(Delivery) -> BoxFuture<'static, HandlerResult> + Send + Sync;

#[derive(Clone)]
enum Callback {
    Sync(Arc<SyncCallback>),
    Async(Arc<AsyncCallback>),
}

/// Outcome of starting a handler.
pub(crate) enum Invocation {
    /// Handler already finished
    Done(HandlerResult),
    /// Handler is still running
    Pending(BoxFuture<'static, HandlerResult>),
}

/// A callable registered on the bus.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    callback: Callback,
}

impl Handler {
    /// Create a synchronous handler.
    ///
    /// # Example
    ///
    /// ```rust
    /// use freshplan_events::Handler;
    ///
    /// let handler = Handler::new(|delivery| {
    ///     println!("{} -> {}", delivery.topic, delivery.payload);
    ///     Ok(())
    /// });
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Delivery) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            id: HandlerId::next(),
            callback: Callback::Sync(Arc::new(f)),
        }
    }

    /// Create an asynchronous handler.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            id: HandlerId::next(),
            callback: Callback::Async(Arc::new(move |delivery| f(delivery).boxed())),
        }
    }

    /// Wrap an [`EventHandler`] implementation.
    pub fn from_event_handler(handler: Arc<dyn EventHandler>) -> Self {
        Self::from_async(move |delivery| {
            let handler = handler.clone();
            async move { handler.handle(delivery).await }
        })
    }

    /// Identity of this handler.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Whether this handler produces a future.
    pub fn is_async(&self) -> bool {
        matches!(self.callback, Callback::Async(_))
    }

    /// Start the handler. Panics are caught and turned into
    /// [`HandlerError::Panicked`], including panics raised while an async
    /// handler's future is polled.
    pub(crate) fn invoke(&self, delivery: &Delivery) -> Invocation {
        match &self.callback {
            Callback::Sync(f) => {
                let result = catch_unwind(AssertUnwindSafe(|| f(delivery)))
                    .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic))));
                Invocation::Done(result)
            }
            Callback::Async(f) => match catch_unwind(AssertUnwindSafe(|| f(delivery.clone()))) {
                Ok(fut) => Invocation::Pending(
                    AssertUnwindSafe(fut)
                        .catch_unwind()
                        .map(|outcome| {
                            outcome.unwrap_or_else(|panic| {
                                Err(HandlerError::Panicked(panic_message(panic)))
                            })
                        })
                        .boxed(),
                ),
                Err(panic) => Invocation::Done(Err(HandlerError::Panicked(panic_message(panic)))),
            },
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("async", &self.is_async())
            .finish()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
