//! Typed in-process event bus.
//!
//! [`EventBus`] maps the [`TypeId`] of an event type to the ordered list of
//! handlers subscribed to it. [`EventBus::publish`] spawns one detached task
//! per matching handler and returns immediately.
//!
//! Delivery is at-most-once and best-effort:
//!
//! - an event with no subscribers is dropped silently;
//! - handlers of one event, and successive publishes, run in no particular
//!   order;
//! - a handler that returns an error or panics is logged and forgotten. It
//!   does not reach the publisher and does not stop other handlers. There is
//!   no retry and no dead-letter queue;
//! - there is no bound on the number of concurrently running handlers.
//!
//! Handler tasks are not tied to the request that published the event: they
//! keep running after the response has been sent.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable fact published by one domain.
///
/// Handlers receive events behind an `Arc` and can never mutate them.
pub trait Event: Any + Send + Sync + 'static {
    /// Stable, dot-separated name used in logs, e.g. `"user.registered"`.
    const NAME: &'static str;
}

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type AnyEvent = Arc<dyn Any + Send + Sync>;

type ErasedHandler = Arc<dyn Fn(AnyEvent) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A registered handler and the name of the event type it listens to.
#[derive(Clone)]
struct Subscription {
    event_name: &'static str,
    handler: ErasedHandler,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// In-process, fire-and-forget publish/subscribe hub.
///
/// Shared via `Arc<EventBus>`. Subscriptions normally happen while the
/// process is being wired together, but the registry is behind its own lock
/// so late subscriptions are safe; `publish` only holds the read lock long
/// enough to clone the handler list.
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<HashMap<TypeId, Vec<Subscription>>>,
    tasks: TaskTracker,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every future event of type `E`.
    ///
    /// Several handlers may subscribe to the same type; they are kept in
    /// registration order.
    pub fn subscribe<E, F, Fut>(&self, handler: F)
    where
        E: Event,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |event: AnyEvent| match event.downcast::<E>() {
            Ok(event) => handler(event).boxed(),
            Err(_) => async { HandlerResult::Err(format!("event is not a {}", E::NAME).into()) }
                .boxed(),
        });

        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Subscription {
                event_name: E::NAME,
                handler: erased,
            });

        tracing::debug!(event = E::NAME, "Event handler subscribed");
    }

    /// Publish `event` to every handler subscribed to its type.
    ///
    /// Returns the number of handler tasks spawned. Never blocks on, and
    /// never observes the outcome of, any handler.
    pub fn publish<E: Event>(&self, event: E) -> usize {
        let subscriptions = self.subscriptions_for(TypeId::of::<E>());
        if subscriptions.is_empty() {
            tracing::trace!(event = E::NAME, "No subscribers, event dropped");
            return 0;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(event = E::NAME, "Published outside a Tokio runtime, event dropped");
            return 0;
        };

        let event: AnyEvent = Arc::new(event);
        for (index, subscription) in subscriptions.iter().enumerate() {
            let subscription = subscription.clone();
            let event = Arc::clone(&event);
            self.tasks
                .spawn_on(run_handler(subscription, index, event), &runtime);
        }

        tracing::debug!(
            event = E::NAME,
            handlers = subscriptions.len(),
            "Event published"
        );
        subscriptions.len()
    }

    /// Number of handlers currently subscribed to `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscriptions_for(TypeId::of::<E>()).len()
    }

    /// Number of handler tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `timeout` for in-flight handlers to finish.
    ///
    /// Returns `true` if every handler completed in time. Used on graceful
    /// shutdown only; events published afterwards still run.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(timeout, self.tasks.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                in_flight = self.tasks.len(),
                "Event handlers still running at shutdown"
            );
        }
        drained
    }

    fn subscriptions_for(&self, type_id: TypeId) -> Vec<Subscription> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Run one handler to completion, absorbing its error or panic.
async fn run_handler(subscription: Subscription, index: usize, event: AnyEvent) {
    let handler = Arc::clone(&subscription.handler);
    let outcome = AssertUnwindSafe(async move { handler(event).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            tracing::trace!(event = subscription.event_name, handler = index, "Event handled");
        }
        Ok(Err(e)) => {
            tracing::error!(
                event = subscription.event_name,
                handler = index,
                error = %e,
                "Event handler failed"
            );
        }
        Err(panic) => {
            tracing::error!(
                event = subscription.event_name,
                handler = index,
                panic = %panic_message(panic.as_ref()),
                "Event handler panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
