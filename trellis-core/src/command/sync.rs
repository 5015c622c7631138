//! Synchronous commands.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::notify::EventHandlers;
use crate::viewmodel::ViewModel;

use super::binding::ContextBinding;
use super::{CommandHandle, CommandId};

/// The overridable half of a synchronous command.
///
/// `P` is the command parameter type supplied by the binding layer.
///
/// ```rust,ignore
/// struct Save;
///
/// impl CommandBehavior<Document> for Save {
///     fn can_execute_depends_on(&self) -> &[&'static str] {
///         &["IsDirty"]
///     }
///
///     fn can_execute(&self, doc: &Document, _: &()) -> bool {
///         doc.node().is_dirty()
///     }
///
///     fn execute(&self, doc: &Document, _: &()) {
///         doc.save();
///     }
/// }
/// ```
pub trait CommandBehavior<C, P = ()>: Send + Sync + 'static {
    /// Registry key. Every instance of one behaviour type shares it.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Context properties whose changes affect [`can_execute`](Self::can_execute).
    fn can_execute_depends_on(&self) -> &[&'static str] {
        &[]
    }

    /// Whether the command may run against `context` right now.
    fn can_execute(&self, context: &C, parameter: &P) -> bool {
        let _ = (context, parameter);
        true
    }

    /// Run the command. Only called after `can_execute` returned `true`.
    fn execute(&self, context: &C, parameter: &P);
}

struct CommandInner<C, B, P> {
    binding: ContextBinding<C>,
    behavior: B,
    _parameter: PhantomData<fn(&P)>,
}

/// A synchronous command bound weakly to a context view-model.
///
/// Cloning the command shares its state.
pub struct Command<C, B, P = ()> {
    inner: Arc<CommandInner<C, B, P>>,
}

impl<C, B, P> Command<C, B, P>
where
    C: ViewModel,
    B: CommandBehavior<C, P>,
    P: 'static,
{
    /// Create an unbound command.
    pub fn new(behavior: B) -> Self {
        Self {
            inner: Arc::new(CommandInner {
                binding: ContextBinding::new(),
                behavior,
                _parameter: PhantomData,
            }),
        }
    }

    /// Create a command bound to `context`.
    pub fn with_parent(behavior: B, context: &Arc<C>) -> Self {
        let command = Self::new(behavior);
        command.set_parent(Some(context));
        command
    }

    /// Instance identity.
    pub fn id(&self) -> CommandId {
        self.inner.binding.id()
    }

    /// Registry key.
    pub fn name(&self) -> &'static str {
        self.inner.behavior.name()
    }

    /// The behaviour this command runs.
    pub fn behavior(&self) -> &B {
        &self.inner.behavior
    }

    /// The context view-model, if still alive.
    pub fn parent(&self) -> Option<Arc<C>> {
        self.inner.binding.context()
    }

    /// Rebind to a new context. Listening moves from the old context to the
    /// new one.
    pub fn set_parent(&self, context: Option<&Arc<C>>) -> bool {
        self.inner
            .binding
            .set_parent(context, self.inner.behavior.can_execute_depends_on())
    }

    /// Whether the command may run. `false` without a live context.
    pub fn can_execute(&self, parameter: &P) -> bool {
        self.parent()
            .is_some_and(|context| self.inner.behavior.can_execute(&context, parameter))
    }

    /// Run the command if it can execute. Returns whether it ran.
    pub fn execute(&self, parameter: &P) -> bool {
        let Some(context) = self.parent() else {
            tracing::debug!(command = self.name(), "no live context, execution skipped");
            return false;
        };
        if !self.inner.behavior.can_execute(&context, parameter) {
            tracing::trace!(command = self.name(), "cannot execute, skipped");
            return false;
        }
        self.inner.behavior.execute(&context, parameter);
        true
    }

    /// Raised when "can execute" may have changed.
    pub fn can_execute_changed(&self) -> &EventHandlers<()> {
        self.inner.binding.can_execute_changed()
    }

    /// Raise can-execute-changed.
    pub fn raise_can_execute_changed(&self) {
        self.inner.binding.can_execute_changed().emit(&());
    }

    /// Raised when the command's own properties change (`Parent`).
    pub fn property_changed(&self) -> &EventHandlers<str> {
        self.inner.binding.notifier().property_changed()
    }

    /// Type-erased handle for a view-model's command map.
    pub fn handle(&self) -> Arc<dyn CommandHandle> {
        Arc::new(self.clone())
    }
}

impl<C, B, P> CommandHandle for Command<C, B, P>
where
    C: ViewModel,
    B: CommandBehavior<C, P>,
    P: 'static,
{
    fn id(&self) -> CommandId {
        self.inner.binding.id()
    }

    fn name(&self) -> &'static str {
        self.inner.behavior.name()
    }

    fn can_execute_depends_on(&self) -> &[&'static str] {
        self.inner.behavior.can_execute_depends_on()
    }

    fn can_execute_changed(&self) -> &EventHandlers<()> {
        self.inner.binding.can_execute_changed()
    }
}

impl<C, B, P> Clone for Command<C, B, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, B, P> fmt::Debug for Command<C, B, P>
where
    C: ViewModel,
    B: CommandBehavior<C, P>,
    P: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PropertyDecl, TypeDescriptor};
    use crate::notify::Property;
    use crate::viewmodel::ViewModelNode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    struct Counter {
        node: ViewModelNode,
        count: Property<i32>,
        limit: Property<i32>,
        executed: AtomicUsize,
    }

    impl Counter {
        fn new() -> Arc<Self> {
            static COUNTER: OnceLock<TypeDescriptor> = OnceLock::new();
            let descriptor = COUNTER.get_or_init(|| {
                TypeDescriptor::builder("Counter")
                    .extends(ViewModelNode::descriptor())
                    .property("Count", PropertyDecl::new())
                    .property("Limit", PropertyDecl::new())
                    .property("Remaining", PropertyDecl::new().depends_on(["Count", "Limit"]))
                    .build()
            });
            Arc::new(Self {
                node: ViewModelNode::new(descriptor),
                count: Property::new("Count", 0),
                limit: Property::new("Limit", 3),
                executed: AtomicUsize::new(0),
            })
        }
    }

    impl ViewModel for Counter {
        fn node(&self) -> &ViewModelNode {
            &self.node
        }
    }

    struct Increment;

    impl CommandBehavior<Counter> for Increment {
        fn can_execute_depends_on(&self) -> &[&'static str] {
            &["Remaining"]
        }

        fn can_execute(&self, counter: &Counter, _: &()) -> bool {
            counter.count.get() < counter.limit.get()
        }

        fn execute(&self, counter: &Counter, _: &()) {
            counter.executed.fetch_add(1, Ordering::SeqCst);
            counter.node.set_property(&counter.count, counter.count.get() + 1);
        }
    }

    struct AddBy;

    impl CommandBehavior<Counter, i32> for AddBy {
        fn execute(&self, counter: &Counter, amount: &i32) {
            counter.node.set_property(&counter.count, counter.count.get() + amount);
        }
    }

    fn count_raises(command: &dyn CommandHandle) -> Arc<AtomicUsize> {
        let raised = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&raised);
        command.can_execute_changed().subscribe(move |_| {
            clone.fetch_add(1, Ordering::SeqCst);
        });
        raised
    }

    #[test]
    fn name_defaults_to_type_name() {
        let a = Command::<Counter, _>::new(Increment);
        let b = Command::<Counter, _>::new(Increment);

        assert!(a.name().ends_with("Increment"));
        assert_eq!(a.name(), b.name());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn unbound_command_cannot_execute() {
        let command = Command::<Counter, _>::new(Increment);
        assert!(!command.can_execute(&()));
        assert!(!command.execute(&()));
    }

    #[test]
    fn execute_checks_can_execute() {
        let counter = Counter::new();
        let command = Command::with_parent(Increment, &counter);

        for _ in 0..5 {
            command.execute(&());
        }
        assert_eq!(counter.count.get(), 3);
        assert_eq!(counter.executed.load(Ordering::SeqCst), 3);
        assert!(!command.can_execute(&()));
    }

    #[test]
    fn parameters_reach_the_behavior() {
        let counter = Counter::new();
        let command = Command::with_parent(AddBy, &counter);

        assert!(command.execute(&5));
        assert_eq!(counter.count.get(), 5);
    }

    #[test]
    fn bound_command_listens_through_closure() {
        let counter = Counter::new();
        let command = Command::with_parent(Increment, &counter);
        let raised = count_raises(&command);

        counter.node.set_property(&counter.limit, 10);
        assert_eq!(raised.load(Ordering::SeqCst), 1);

        // IsDirty is not a dependency.
        counter.node.accept_changes();
        assert_eq!(raised.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registered_command_is_raised_once() {
        let counter = Counter::new();
        let command = Command::with_parent(Increment, &counter);
        counter.node.add_command(command.handle());
        let raised = count_raises(&command);

        counter.node.set_property(&counter.count, 1);
        assert_eq!(raised.load(Ordering::SeqCst), 1);

        // After removal the command's own subscription takes over.
        assert!(counter.node.remove_command(command.name()));
        assert!(!counter.node.remove_command(command.name()));
        counter.node.set_property(&counter.count, 2);
        assert_eq!(raised.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reparenting_moves_the_subscription() {
        let first = Counter::new();
        let second = Counter::new();
        let command = Command::with_parent(Increment, &first);
        let raised = count_raises(&command);

        assert!(command.set_parent(Some(&second)));
        first.node.set_property(&first.count, 1);
        assert_eq!(raised.load(Ordering::SeqCst), 0);

        second.node.set_property(&second.count, 1);
        assert_eq!(raised.load(Ordering::SeqCst), 1);

        assert!(command.set_parent(None));
        second.node.set_property(&second.count, 2);
        assert_eq!(raised.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reparenting_reports_parent() {
        let counter = Counter::new();
        let command = Command::<Counter, _>::new(Increment);
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let clone = Arc::clone(&names);
        command
            .property_changed()
            .subscribe(move |name: &str| clone.lock().push(name.to_string()));

        assert!(command.set_parent(Some(&counter)));
        assert!(!command.set_parent(Some(&counter)));
        assert!(command.set_parent(None));
        assert_eq!(*names.lock(), vec!["Parent", "Parent"]);
    }

    #[test]
    fn context_is_not_kept_alive() {
        let counter = Counter::new();
        let command = Command::with_parent(Increment, &counter);
        counter.node.add_command(command.handle());

        drop(counter);
        assert!(command.parent().is_none());
        assert!(!command.can_execute(&()));
    }

    #[test]
    fn duplicate_names_replace() {
        let counter = Counter::new();
        let first = Command::with_parent(Increment, &counter);
        let second = Command::with_parent(Increment, &counter);

        assert!(counter.node.add_command(first.handle()).is_none());
        let replaced = counter.node.add_command(second.handle());
        assert_eq!(replaced.map(|c| c.id()), Some(first.id()));
        assert_eq!(counter.node.command_names(), vec![first.name()]);
        assert!(counter.node.owns_command(second.id()));
        assert!(!counter.node.owns_command(first.id()));
    }
}
