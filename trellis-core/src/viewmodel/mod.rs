//! View-Model Nodes
//!
//! [`ViewModelNode`] is the state every view-model embeds. It layers on top
//! of the [`ComputedNotifier`]:
//!
//! - dirty tracking: a successful mutation of a non-exempt property sets
//!   `IsDirty`, and so does any change inside a tracked collection,
//! - read-only gating: while `IsReadOnly` is set, only `IsReadOnly` itself
//!   and read-only-exempt properties accept writes,
//! - a weak `Parent` reference,
//! - a named command registry whose entries are re-evaluated whenever a
//!   property they declared a dependency on is notified.
//!
//! # Notification Pipeline
//!
//! For one mutation of `Age`:
//!
//! 1. "changing" for `Age`, then the store.
//! 2. "changed" for `Age`, then for each property in its closure.
//! 3. One can-execute-changed per registered command whose dependencies
//!    intersect the notified names.
//! 4. One `notified` batch carrying every notified name.
//! 5. `IsDirty` is set unless `Age` is dirty-exempt.
//!
//! A concrete view-model owns a node and its own [`Property`] fields, and
//! implements [`ViewModel`] so commands and child nodes can reach the node
//! through a weak reference.

mod collection;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::command::{CommandHandle, CommandId};
use crate::error::Result;
use crate::graph::{PropertyDecl, TypeDescriptor};
use crate::notify::{ComputedNotifier, EventHandlers, Property, Subscription};
use crate::tree::TreeItem;

pub use collection::{CollectionChange, NotifyCollectionChanged, ObservableVec};

/// Implemented by every concrete view-model.
pub trait ViewModel: Send + Sync + 'static {
    /// The node holding this view-model's notification state.
    fn node(&self) -> &ViewModelNode;

    /// Downcast hook for tree propagation.
    fn as_tree_item(&self) -> Option<&dyn TreeItem> {
        None
    }
}

struct NodeInner {
    notifier: ComputedNotifier,
    is_dirty: Property<bool>,
    is_read_only: Property<bool>,
    parent: RwLock<Option<Weak<dyn ViewModel>>>,
    commands: RwLock<IndexMap<&'static str, Arc<dyn CommandHandle>>>,
    notified: EventHandlers<[&'static str]>,
    collections: Mutex<HashMap<&'static str, Subscription>>,
}

/// Notification, dirty, read-only, parent and command state of one
/// view-model instance.
///
/// Cloning the node shares its state.
#[derive(Clone)]
pub struct ViewModelNode {
    inner: Arc<NodeInner>,
}

impl ViewModelNode {
    /// Name of the dirty flag property.
    pub const IS_DIRTY: &'static str = "IsDirty";
    /// Name of the read-only flag property.
    pub const IS_READ_ONLY: &'static str = "IsReadOnly";
    /// Name of the parent property.
    pub const PARENT: &'static str = "Parent";

    /// Declarations shared by every view-model. Concrete descriptors should
    /// extend this one.
    pub fn descriptor() -> &'static TypeDescriptor {
        static VIEW_MODEL: OnceLock<TypeDescriptor> = OnceLock::new();
        VIEW_MODEL.get_or_init(|| {
            TypeDescriptor::builder("ViewModel")
                .property(
                    Self::IS_DIRTY,
                    PropertyDecl::new()
                        .dirty_exempt_inherited()
                        .read_only_exempt_inherited(),
                )
                .property(Self::IS_READ_ONLY, PropertyDecl::new().dirty_exempt_inherited())
                .property(
                    Self::PARENT,
                    PropertyDecl::new()
                        .dirty_exempt_inherited()
                        .read_only_exempt_inherited(),
                )
                .build()
        })
    }

    /// Create the node for an instance of the type `descriptor` describes.
    pub fn new(descriptor: &'static TypeDescriptor) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                notifier: ComputedNotifier::new(descriptor),
                is_dirty: Property::new(Self::IS_DIRTY, false),
                is_read_only: Property::new(Self::IS_READ_ONLY, false),
                parent: RwLock::new(None),
                commands: RwLock::new(IndexMap::new()),
                notified: EventHandlers::new(),
                collections: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The declaration table of the owning type.
    pub fn type_descriptor(&self) -> &'static TypeDescriptor {
        self.inner.notifier.descriptor()
    }

    /// Raised before a property's storage is written.
    pub fn property_changing(&self) -> &EventHandlers<str> {
        self.inner.notifier.property_changing()
    }

    /// Raised for each changed property and each of its dependents.
    pub fn property_changed(&self) -> &EventHandlers<str> {
        self.inner.notifier.property_changed()
    }

    /// Raised once per mutation with every name notified by it.
    pub fn notified(&self) -> &EventHandlers<[&'static str]> {
        &self.inner.notified
    }

    // ------------------------------------------------------------------
    // Property writes
    // ------------------------------------------------------------------

    /// Compare-and-set a property through the full pipeline.
    ///
    /// Returns `false` when the value is unchanged, the write is blocked by
    /// read-only, or the property has a blank name. See
    /// [`try_set_property`](Self::try_set_property) for the error.
    pub fn set_property<T: PartialEq>(&self, property: &Property<T>, value: T) -> bool {
        self.set_property_by(property, value, T::eq)
    }

    /// [`set_property`](Self::set_property) with a caller-supplied equality.
    ///
    /// Replacing a collection this way leaves dirty tracking on the old
    /// instance. Use [`set_collection_property`](Self::set_collection_property)
    /// to move it.
    pub fn set_property_by<T, E>(&self, property: &Property<T>, value: T, eq: E) -> bool
    where
        E: Fn(&T, &T) -> bool,
    {
        self.try_set_property_by(property, value, eq).unwrap_or_else(|err| {
            tracing::warn!(%err, "property write refused");
            false
        })
    }

    /// [`set_property`](Self::set_property) that reports a blank property
    /// name as [`Error::InvalidArgument`](crate::Error::InvalidArgument).
    /// Nothing is stored in that case.
    pub fn try_set_property<T: PartialEq>(
        &self,
        property: &Property<T>,
        value: T,
    ) -> Result<bool> {
        self.try_set_property_by(property, value, T::eq)
    }

    /// [`try_set_property`](Self::try_set_property) with a caller-supplied
    /// equality.
    pub fn try_set_property_by<T, E>(
        &self,
        property: &Property<T>,
        value: T,
        eq: E,
    ) -> Result<bool>
    where
        E: Fn(&T, &T) -> bool,
    {
        let name = property.name();
        if self.is_write_blocked(name) {
            tracing::trace!(property = name, "write blocked by read-only view-model");
            return Ok(false);
        }
        if self
            .inner
            .notifier
            .notifier()
            .swap_field(property, value, eq)?
            .is_none()
        {
            return Ok(false);
        }
        if self.inner.collections.lock().contains_key(name) {
            tracing::debug!(property = name, "collection tracking left on the previous value");
        }

        self.propagate(name, &[])?;
        if !self.is_dirty_exempt(name) {
            self.mark_dirty();
        }
        Ok(true)
    }

    /// Set a collection-valued property and move dirty tracking from the
    /// old collection instance to the new one.
    pub fn set_collection_property<C>(&self, property: &Property<C>, value: C) -> bool
    where
        C: NotifyCollectionChanged + Clone,
    {
        let tracked = value.clone();
        let name = property.name();
        // Untracked during the write, restored if nothing was stored.
        let previous = self.inner.collections.lock().remove(name);
        if !self.set_property_by(property, value, C::same_collection) {
            if let Some(subscription) = previous {
                self.inner.collections.lock().insert(name, subscription);
            }
            return false;
        }
        self.track_collection(name, &tracked);
        true
    }

    /// Mark the view-model dirty whenever `collection`'s contents change.
    ///
    /// Replaces any collection previously tracked under `name`. Dirty-exempt
    /// properties are not tracked.
    pub fn track_collection<C>(&self, name: &'static str, collection: &C)
    where
        C: NotifyCollectionChanged,
    {
        let mut collections = self.inner.collections.lock();
        if self.is_dirty_exempt(name) {
            collections.remove(name);
            return;
        }

        let node = Arc::downgrade(&self.inner);
        let subscription = collection
            .collection_changed()
            .subscribe_scoped(move |change: &CollectionChange| {
                if let Some(inner) = node.upgrade() {
                    tracing::trace!(property = name, ?change, "tracked collection changed");
                    ViewModelNode { inner }.mark_dirty();
                }
            });
        collections.insert(name, subscription);
    }

    /// Raise the full pipeline for `name` without a store, e.g. for a
    /// property whose value is derived on read.
    pub fn notify_changed(&self, name: &'static str) -> Result<()> {
        self.propagate(name, &[]).map(|_| ())
    }

    /// [`notify_changed`](Self::notify_changed) with extra names to include.
    pub fn notify_changed_with(
        &self,
        name: &'static str,
        additional: &[&'static str],
    ) -> Result<Vec<&'static str>> {
        self.propagate(name, additional)
    }

    fn propagate(
        &self,
        name: &'static str,
        additional: &[&'static str],
    ) -> Result<Vec<&'static str>> {
        let notified = self.inner.notifier.notify_changed(name, additional)?;
        self.refresh_commands(&notified);
        self.inner.notified.emit(&notified);
        Ok(notified)
    }

    fn refresh_commands(&self, notified: &[&'static str]) {
        let commands: Vec<Arc<dyn CommandHandle>> =
            self.inner.commands.read().values().cloned().collect();
        for command in commands {
            if command.depends_on_any(notified) {
                tracing::trace!(command = command.name(), "re-evaluating command");
                command.raise_can_execute_changed();
            }
        }
    }

    fn is_write_blocked(&self, name: &str) -> bool {
        self.is_read_only() && name != Self::IS_READ_ONLY && !self.is_read_only_exempt(name)
    }

    /// Whether changing `name` leaves the dirty flag alone.
    pub fn is_dirty_exempt(&self, name: &str) -> bool {
        matches!(name, Self::IS_DIRTY | Self::IS_READ_ONLY | Self::PARENT)
            || self.type_descriptor().is_dirty_exempt(name)
    }

    /// Whether `name` accepts writes while the view-model is read-only.
    pub fn is_read_only_exempt(&self, name: &str) -> bool {
        matches!(name, Self::IS_DIRTY | Self::PARENT)
            || self.type_descriptor().is_read_only_exempt(name)
    }

    // ------------------------------------------------------------------
    // Dirty and read-only flags
    // ------------------------------------------------------------------

    /// Whether unpersisted changes exist.
    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty.get()
    }

    /// Set or clear the dirty flag.
    pub fn set_dirty(&self, dirty: bool) -> bool {
        self.set_property(&self.inner.is_dirty, dirty)
    }

    /// Clear the dirty flag, typically after the state was persisted.
    pub fn accept_changes(&self) -> bool {
        self.set_dirty(false)
    }

    fn mark_dirty(&self) {
        self.set_dirty(true);
    }

    /// Whether writes are blocked.
    pub fn is_read_only(&self) -> bool {
        self.inner.is_read_only.get()
    }

    /// Block or unblock writes.
    pub fn set_read_only(&self, read_only: bool) -> bool {
        self.set_property(&self.inner.is_read_only, read_only)
    }

    // ------------------------------------------------------------------
    // Parent
    // ------------------------------------------------------------------

    /// The parent view-model, if it is still alive.
    pub fn parent(&self) -> Option<Arc<dyn ViewModel>> {
        self.inner.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Point at a new parent without keeping it alive.
    pub fn set_parent<P: ViewModel>(&self, parent: Option<&Arc<P>>) -> bool {
        self.set_parent_weak(parent.map(|p| Arc::downgrade(p) as Weak<dyn ViewModel>))
    }

    /// [`set_parent`](Self::set_parent) for an already type-erased handle.
    pub fn set_parent_weak(&self, parent: Option<Weak<dyn ViewModel>>) -> bool {
        let unchanged = match (self.inner.parent.read().as_ref(), parent.as_ref()) {
            (Some(old), Some(new)) => Weak::ptr_eq(old, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }

        self.inner.notifier.property_changing().emit(Self::PARENT);
        *self.inner.parent.write() = parent;
        if let Err(err) = self.propagate(Self::PARENT, &[]) {
            tracing::warn!(%err, "parent notification rejected");
        }
        true
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Register a command under its name.
    ///
    /// A command already registered under the same name is replaced and
    /// returned.
    pub fn add_command(&self, command: Arc<dyn CommandHandle>) -> Option<Arc<dyn CommandHandle>> {
        let name = command.name();
        let replaced = self.inner.commands.write().insert(name, command);
        if replaced.is_some() {
            tracing::debug!(command = name, "replaced registered command");
        }
        replaced
    }

    /// Unregister the command called `name`. Returns `false` if absent.
    pub fn remove_command(&self, name: &str) -> bool {
        self.inner.commands.write().shift_remove(name).is_some()
    }

    /// The command registered under `name`.
    pub fn command(&self, name: &str) -> Option<Arc<dyn CommandHandle>> {
        self.inner.commands.read().get(name).cloned()
    }

    /// Names of all registered commands, in registration order.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.inner.commands.read().keys().copied().collect()
    }

    /// Whether the command with `id` is registered on this node.
    pub fn owns_command(&self, id: CommandId) -> bool {
        self.inner
            .commands
            .read()
            .values()
            .any(|command| command.id() == id)
    }
}

impl fmt::Debug for ViewModelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelNode")
            .field("type_name", &self.type_descriptor().type_name())
            .field("is_dirty", &self.is_dirty())
            .field("is_read_only", &self.is_read_only())
            .field("has_parent", &self.parent().is_some())
            .field("commands", &self.command_names())
            .finish()
    }
}
