//! Property Storage
//!
//! A [`Property`] is the backing field of one observable view-model property:
//! a declared name plus a lock-protected value.
//!
//! # How Properties Work
//!
//! 1. A view-model owns one `Property<T>` per observable field, named after
//!    the entry in its type descriptor.
//!
//! 2. Reads go straight to the value. Writes go through a notifier
//!    (`set_property` on a node), which compares, stores and raises the
//!    change events.
//!
//! 3. Cloning a property shares the storage. Validators keep such clones as
//!    selectors so they can re-read the current value later without holding
//!    on to the view-model itself.
//!
//! # Thread Safety
//!
//! The value is protected by a `parking_lot::RwLock`. The lock is never held
//! while change events are dispatched.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;

/// A named, shared storage slot for an observable property.
pub struct Property<T> {
    /// Declared property name.
    name: &'static str,

    /// The current value.
    value: Arc<RwLock<T>>,
}

impl<T> Property<T> {
    /// Create a property with an initial value.
    ///
    /// No events are raised for the initial value.
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// The declared property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.read().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Whether both handles share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Store `value` if `eq` says it differs, returning the previous value.
    ///
    /// `before_write` runs after the comparison and before the store, with
    /// the lock released.
    pub(crate) fn replace_if<E, B>(&self, value: T, eq: E, before_write: B) -> Option<T>
    where
        E: Fn(&T, &T) -> bool,
        B: FnOnce(),
    {
        let unchanged = {
            let current = self.value.read();
            eq(&*current, &value)
        };
        if unchanged {
            return None;
        }
        before_write();
        Some(std::mem::replace(&mut *self.value.write(), value))
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Debug> Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &*self.value.read())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_get_and_with() {
        let prop = Property::new("Name", String::from("Ada"));
        assert_eq!(prop.name(), "Name");
        assert_eq!(prop.get(), "Ada");
        assert_eq!(prop.with(|v| v.len()), 3);
    }

    #[test]
    fn replace_if_skips_equal_values() {
        let prop = Property::new("Age", 4);
        let mut before = 0;

        assert_eq!(prop.replace_if(4, |a, b| a == b, || before += 1), None);
        assert_eq!(before, 0);

        assert_eq!(prop.replace_if(5, |a, b| a == b, || before += 1), Some(4));
        assert_eq!(before, 1);
        assert_eq!(prop.get(), 5);
    }

    #[test]
    fn property_clone_shares_state() {
        let prop1 = Property::new("Age", 0);
        let prop2 = prop1.clone();

        prop1.replace_if(42, |a, b| a == b, || {});
        assert_eq!(prop2.get(), 42);
        assert!(prop1.ptr_eq(&prop2));
        assert!(!prop1.ptr_eq(&Property::new("Age", 42)));
    }
}
