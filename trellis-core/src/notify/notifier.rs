//! Change Notifier
//!
//! The minimal notification primitive: a "changing" and a "changed" event,
//! each carrying a property name, and a compare-and-set helper that only
//! raises them when a value actually differs.
//!
//! Layers above this one ([`ComputedNotifier`](super::ComputedNotifier) and
//! the view-model node) use `swap_field` to perform the
//! store and then raise "changed" themselves, so they can fan the
//! notification out to dependent properties.

use crate::error::{check_name, Result};

use super::event::EventHandlers;
use super::property::Property;

/// Property changing/changed events plus compare-and-set.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    changing: EventHandlers<str>,
    changed: EventHandlers<str>,
}

impl ChangeNotifier {
    /// Create a notifier with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raised before a property's storage is written.
    pub fn property_changing(&self) -> &EventHandlers<str> {
        &self.changing
    }

    /// Raised after a property's value changed.
    pub fn property_changed(&self) -> &EventHandlers<str> {
        &self.changed
    }

    /// Raise "changing" for `name`.
    pub fn raise_changing(&self, name: &str) -> Result<()> {
        check_name(name, "property name")?;
        self.changing.emit(name);
        Ok(())
    }

    /// Raise "changed" for `name`.
    pub fn raise_changed(&self, name: &str) -> Result<()> {
        check_name(name, "property name")?;
        self.changed.emit(name);
        Ok(())
    }

    /// Store `value` if it differs from the current one and raise both
    /// events. Returns whether the value changed.
    ///
    /// A property with a blank name is rejected before anything is stored.
    pub fn set_field<T: PartialEq>(&self, property: &Property<T>, value: T) -> Result<bool> {
        self.set_field_by(property, value, T::eq)
    }

    /// [`set_field`](Self::set_field) with a caller-supplied equality.
    pub fn set_field_by<T, E>(&self, property: &Property<T>, value: T, eq: E) -> Result<bool>
    where
        E: Fn(&T, &T) -> bool,
    {
        if self.swap_field(property, value, eq)?.is_none() {
            return Ok(false);
        }
        self.changed.emit(property.name());
        Ok(true)
    }

    /// Compare, raise "changing", store. Returns the previous value on
    /// change. "changed" is left to the caller.
    pub(crate) fn swap_field<T, E>(
        &self,
        property: &Property<T>,
        value: T,
        eq: E,
    ) -> Result<Option<T>>
    where
        E: Fn(&T, &T) -> bool,
    {
        let name = property.name();
        check_name(name, "property name")?;
        Ok(property.replace_if(value, eq, || self.changing.emit(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn record(notifier: &ChangeNotifier) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let changing = Arc::clone(&log);
        notifier
            .property_changing()
            .subscribe(move |name: &str| changing.lock().push(format!("changing:{name}")));
        let changed = Arc::clone(&log);
        notifier
            .property_changed()
            .subscribe(move |name: &str| changed.lock().push(format!("changed:{name}")));
        log
    }

    #[test]
    fn set_field_raises_changing_then_changed() {
        let notifier = ChangeNotifier::new();
        let log = record(&notifier);
        let age = Property::new("Age", 1);

        assert!(notifier.set_field(&age, 2).unwrap());
        assert_eq!(age.get(), 2);
        assert_eq!(*log.lock(), vec!["changing:Age", "changed:Age"]);
    }

    #[test]
    fn equal_value_is_silent() {
        let notifier = ChangeNotifier::new();
        let log = record(&notifier);
        let age = Property::new("Age", 1);

        assert!(!notifier.set_field(&age, 1).unwrap());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn changing_observes_old_value() {
        let notifier = ChangeNotifier::new();
        let age = Property::new("Age", 1);
        let seen = Arc::new(Mutex::new(None));

        let age_clone = age.clone();
        let seen_clone = Arc::clone(&seen);
        notifier.property_changing().subscribe(move |_: &str| {
            *seen_clone.lock() = Some(age_clone.get());
        });

        notifier.set_field(&age, 9).unwrap();
        assert_eq!(*seen.lock(), Some(1));
    }

    #[test]
    fn custom_comparer_decides_change() {
        let notifier = ChangeNotifier::new();
        let name = Property::new("Name", String::from("ada"));

        let case_insensitive = |a: &String, b: &String| a.eq_ignore_ascii_case(b);
        assert!(!notifier
            .set_field_by(&name, String::from("ADA"), case_insensitive)
            .unwrap());
        assert!(notifier
            .set_field_by(&name, String::from("bob"), case_insensitive)
            .unwrap());
        assert_eq!(name.get(), "bob");
    }

    #[test]
    fn raise_rejects_blank_names() {
        let notifier = ChangeNotifier::new();
        assert!(notifier.raise_changed("").is_err());
        assert!(notifier.raise_changing("  ").is_err());
        assert!(notifier.raise_changed("Age").is_ok());
    }

    #[test]
    fn unnamed_property_is_never_stored() {
        let notifier = ChangeNotifier::new();
        let log = record(&notifier);
        let unnamed = Property::new(" ", 1);

        assert!(matches!(
            notifier.set_field(&unnamed, 2),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(unnamed.get(), 1);
        assert!(log.lock().is_empty());
    }
}
