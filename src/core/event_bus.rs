//! In-process publish/subscribe registry
//!
//! The bus is an explicit dependency: publishers and subscribers share it by
//! `Arc` handle instead of reaching for a process-wide singleton.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

/// Subscriber callback invoked synchronously for every published payload
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifier returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publish/subscribe registry for one payload type
///
/// Delivery happens on the publishing task, in subscription order. Only one
/// publish is expected in flight at a time.
pub struct EventBus<T> {
    subscribers: RwLock<Vec<(SubscriberId, Handler<T>)>>,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler
    pub async fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribers.write().await.push((id, Arc::new(handler)));
        debug!(subscriber = %id, "Subscribed to event bus");
        id
    }

    /// Remove a handler, returning whether it was registered
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|(subscriber, _)| *subscriber != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!(subscriber = %id, "Unsubscribed from event bus");
        }
        removed
    }

    /// Deliver a payload to every current subscriber
    ///
    /// Returns the number of handlers invoked.
    pub async fn publish(&self, payload: &T) -> usize {
        // Handlers run without the lock held
        let handlers: Vec<Handler<T>> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
