//! Multicast event lists.
//!
//! Every event surface in the crate (property changing/changed, batch
//! notifications, can-execute-changed, errors-changed, collection-changed) is
//! an [`EventHandlers`] list. Handlers are identified by a [`SubscriberId`]
//! and can be removed explicitly or through a [`Subscription`] guard.
//!
//! Dispatch snapshots the handler list first, so a handler may subscribe or
//! unsubscribe (itself included) without deadlocking. Removal takes effect on
//! the next emission.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Unique identifier for an event handler.
///
/// Uses an atomic counter so ids are unique across threads and across every
/// event list in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;
type HandlerList<A> = RwLock<Vec<(SubscriberId, Handler<A>)>>;

/// An ordered list of handlers for one event.
///
/// Handlers run in registration order. Cloning the list shares it.
pub struct EventHandlers<A: ?Sized> {
    handlers: Arc<HandlerList<A>>,
}

impl<A: ?Sized> EventHandlers<A> {
    /// Create an empty handler list.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a handler and return its id.
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Invoke every handler with `args`.
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<Handler<A>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(args);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl<A: ?Sized + 'static> EventHandlers<A> {
    /// Register a handler that is removed when the returned guard drops.
    pub fn subscribe_scoped<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = self.subscribe(handler);
        let list: Weak<HandlerList<A>> = Arc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(list) = list.upgrade() {
                list.write().retain(|(existing, _)| *existing != id);
            }
        })
    }
}

impl<A: ?Sized> Default for EventHandlers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> Clone for EventHandlers<A> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<A: ?Sized> fmt::Debug for EventHandlers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("len", &self.len())
            .finish()
    }
}

/// RAII guard that runs a release action once, when dropped.
///
/// Used for scoped event subscriptions. The event list is only weakly
/// referenced, so a guard never keeps its source alive; if the source is gone
/// the release is a no-op.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a guard around an arbitrary release action.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release now instead of at drop.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
