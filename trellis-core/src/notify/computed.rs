//! Computed Notifier
//!
//! Wraps a [`ChangeNotifier`] and a [`NotificationCache`]. On construction it
//! registers one edge per declared dependency of the owning type; afterwards
//! every outgoing "changed" notification is re-raised for each transitively
//! dependent property.
//!
//! # How It Works
//!
//! 1. `new` walks every property in the type descriptor and registers
//!    `source -> property` for each resolved source. Self references and
//!    sources that name no declared property are skipped with a debug log.
//!
//! 2. `notify_changed("Age")` raises "changed" for `Age`, then for every
//!    name in the cached closure of `Age` (plus any extra names the caller
//!    supplied), each once, origin first.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::{check_name, Result};
use crate::graph::{NotificationCache, TypeDescriptor};

use super::event::EventHandlers;
use super::notifier::ChangeNotifier;
use super::property::Property;

/// Change notifier with declared dependency propagation.
#[derive(Debug, Clone)]
pub struct ComputedNotifier {
    notifier: ChangeNotifier,
    cache: Arc<NotificationCache>,
    descriptor: &'static TypeDescriptor,
}

impl ComputedNotifier {
    /// Create a notifier for an instance of the type `descriptor` describes.
    pub fn new(descriptor: &'static TypeDescriptor) -> Self {
        let cache = NotificationCache::new();
        register_declared_edges(descriptor, &cache);
        Self {
            notifier: ChangeNotifier::new(),
            cache: Arc::new(cache),
            descriptor,
        }
    }

    /// The declaration table this notifier was built from.
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        self.descriptor
    }

    /// The per-instance dependency graph.
    pub fn cache(&self) -> &NotificationCache {
        &self.cache
    }

    /// The underlying changing/changed events.
    pub(crate) fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Raised before a property's storage is written.
    pub fn property_changing(&self) -> &EventHandlers<str> {
        self.notifier.property_changing()
    }

    /// Raised for a changed property and for each of its dependents.
    pub fn property_changed(&self) -> &EventHandlers<str> {
        self.notifier.property_changed()
    }

    /// Register an extra edge after construction.
    pub fn add_dependency(&self, source: &'static str, target: &'static str) -> Result<()> {
        self.cache.add_edge(source, target)
    }

    /// Raise "changed" for `name`, then for its closure and `additional`.
    ///
    /// Returns the names notified, in the order they were raised.
    pub fn notify_changed(
        &self,
        name: &'static str,
        additional: &[&'static str],
    ) -> Result<Vec<&'static str>> {
        check_name(name, "property name")?;

        let closure = self.cache.transitive_targets(name);
        let mut notified: IndexSet<&'static str> =
            IndexSet::with_capacity(1 + closure.len() + additional.len());
        notified.insert(name);
        notified.extend(closure.iter().copied());
        notified.extend(additional.iter().copied().filter(|n| !n.trim().is_empty()));

        let changed = self.notifier.property_changed();
        for &property in &notified {
            changed.emit(property);
        }
        Ok(notified.into_iter().collect())
    }

    /// Compare-and-set with dependency propagation.
    pub fn set_field<T: PartialEq>(&self, property: &Property<T>, value: T) -> Result<bool> {
        self.set_field_by(property, value, T::eq)
    }

    /// [`set_field`](Self::set_field) with a caller-supplied equality.
    pub fn set_field_by<T, E>(&self, property: &Property<T>, value: T, eq: E) -> Result<bool>
    where
        E: Fn(&T, &T) -> bool,
    {
        if self.notifier.swap_field(property, value, eq)?.is_none() {
            return Ok(false);
        }
        self.notify_changed(property.name(), &[])?;
        Ok(true)
    }
}

fn register_declared_edges(descriptor: &'static TypeDescriptor, cache: &NotificationCache) {
    let declared = descriptor.property_names();
    for &property in &declared {
        for source in descriptor.dependencies_of(property) {
            if source == property {
                tracing::debug!(
                    type_name = descriptor.type_name(),
                    property,
                    "skipping self-referencing dependency"
                );
                continue;
            }
            if !declared.contains(source) {
                tracing::debug!(
                    type_name = descriptor.type_name(),
                    property,
                    source,
                    "skipping dependency on undeclared property"
                );
                continue;
            }
            if let Err(err) = cache.add_edge(source, property) {
                tracing::debug!(%err, "skipping malformed dependency");
            }
        }
    }
}
