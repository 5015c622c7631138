//! Observable collections.
//!
//! A view-model property that holds a collection should mark the view-model
//! dirty not only when the property is reassigned but also when the
//! collection's contents change. [`ObservableVec`] raises a
//! [`CollectionChange`] for every mutation; the view-model node subscribes
//! to whichever instance is currently stored.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::notify::EventHandlers;

/// Description of one collection mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CollectionChange {
    /// `count` items were inserted starting at `index`.
    Added { index: usize, count: usize },
    /// `count` items were removed starting at `index`.
    Removed { index: usize, count: usize },
    /// The item at `index` was replaced.
    Replaced { index: usize },
    /// An item moved from `from` to `to`.
    Moved { from: usize, to: usize },
    /// The contents changed wholesale.
    Reset,
}

/// Types that raise collection-changed notifications.
pub trait NotifyCollectionChanged {
    /// The collection-changed event.
    fn collection_changed(&self) -> &EventHandlers<CollectionChange>;

    /// Whether two handles refer to the same underlying collection.
    fn same_collection(&self, other: &Self) -> bool
    where
        Self: Sized;
}

/// A shared vector that reports its mutations.
///
/// Cloning shares both the items and the event list.
pub struct ObservableVec<T> {
    items: Arc<RwLock<Vec<T>>>,
    changed: EventHandlers<CollectionChange>,
}

impl<T> ObservableVec<T> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Wrap existing items. No event is raised.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            changed: EventHandlers::new(),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Borrow the items for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.read())
    }

    /// Append an item.
    pub fn push(&self, item: T) {
        let index = {
            let mut items = self.items.write();
            items.push(item);
            items.len() - 1
        };
        self.changed.emit(&CollectionChange::Added { index, count: 1 });
    }

    /// Insert an item at `index`. Out-of-range indices append.
    pub fn insert(&self, index: usize, item: T) {
        let index = {
            let mut items = self.items.write();
            let index = index.min(items.len());
            items.insert(index, item);
            index
        };
        self.changed.emit(&CollectionChange::Added { index, count: 1 });
    }

    /// Append several items, raising one event.
    pub fn extend<I: IntoIterator<Item = T>>(&self, iter: I) {
        let (index, count) = {
            let mut items = self.items.write();
            let index = items.len();
            items.extend(iter);
            (index, items.len() - index)
        };
        if count > 0 {
            self.changed.emit(&CollectionChange::Added { index, count });
        }
    }

    /// Remove the item at `index`, if present.
    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.write();
            (index < items.len()).then(|| items.remove(index))
        };
        if removed.is_some() {
            self.changed.emit(&CollectionChange::Removed { index, count: 1 });
        }
        removed
    }

    /// Replace the item at `index`, returning the previous one.
    pub fn replace(&self, index: usize, item: T) -> Option<T> {
        let previous = {
            let mut items = self.items.write();
            items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, item))
        };
        if previous.is_some() {
            self.changed.emit(&CollectionChange::Replaced { index });
        }
        previous
    }

    /// Move the item at `from` to position `to`.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let moved = {
            let mut items = self.items.write();
            if from < items.len() && to < items.len() {
                let item = items.remove(from);
                items.insert(to, item);
                true
            } else {
                false
            }
        };
        if moved && from != to {
            self.changed.emit(&CollectionChange::Moved { from, to });
        }
        moved
    }

    /// Remove every item.
    pub fn clear(&self) {
        let had_items = {
            let mut items = self.items.write();
            let had_items = !items.is_empty();
            items.clear();
            had_items
        };
        if had_items {
            self.changed.emit(&CollectionChange::Reset);
        }
    }
}

impl<T: Clone> ObservableVec<T> {
    /// Clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Clone of all items.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }
}

impl<T> NotifyCollectionChanged for ObservableVec<T> {
    fn collection_changed(&self) -> &EventHandlers<CollectionChange> {
        &self.changed
    }

    fn same_collection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ObservableVec<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            changed: self.changed.clone(),
        }
    }
}

impl<T> From<Vec<T>> for ObservableVec<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.read().iter()).finish()
    }
}
