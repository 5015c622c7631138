//! Context binding shared by every command kind.
//!
//! Holds the weak parent reference, the subscription to the parent's
//! `notified` batches, the command's own can-execute-changed event and a
//! notifier for the command's own properties (`Parent`, `IsWorking`).

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::notify::{ChangeNotifier, EventHandlers, Subscription};
use crate::viewmodel::ViewModel;

use super::CommandId;

pub(crate) const PARENT: &str = "Parent";

pub(crate) struct ContextBinding<C> {
    id: CommandId,
    parent: RwLock<Option<Weak<C>>>,
    subscription: Mutex<Option<Subscription>>,
    can_execute_changed: EventHandlers<()>,
    notifier: ChangeNotifier,
}

impl<C: ViewModel> ContextBinding<C> {
    pub(crate) fn new() -> Self {
        Self {
            id: CommandId::new(),
            parent: RwLock::new(None),
            subscription: Mutex::new(None),
            can_execute_changed: EventHandlers::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    pub(crate) fn id(&self) -> CommandId {
        self.id
    }

    pub(crate) fn can_execute_changed(&self) -> &EventHandlers<()> {
        &self.can_execute_changed
    }

    pub(crate) fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// The context, resolved now. Callers must not assume it stays alive
    /// between two calls.
    pub(crate) fn context(&self) -> Option<Arc<C>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Rebind to `parent`. Returns `false` if it is already the parent.
    pub(crate) fn set_parent(&self, parent: Option<&Arc<C>>, depends_on: &[&'static str]) -> bool {
        let unchanged = match (self.parent.read().as_ref(), parent) {
            (Some(old), Some(new)) => std::ptr::eq(old.as_ptr(), Arc::as_ptr(new)),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }

        self.notifier.property_changing().emit(PARENT);
        // Replacing the guard drops the old subscription.
        *self.subscription.lock() = parent.map(|ctx| self.listen(ctx, depends_on));
        *self.parent.write() = parent.map(Arc::downgrade);
        self.notifier.property_changed().emit(PARENT);
        true
    }

    fn listen(&self, context: &Arc<C>, depends_on: &[&'static str]) -> Subscription {
        let id = self.id;
        let deps: SmallVec<[&'static str; 4]> = depends_on.iter().copied().collect();
        let events = self.can_execute_changed.clone();
        let owner = Arc::downgrade(context);

        context
            .node()
            .notified()
            .subscribe_scoped(move |names: &[&'static str]| {
                if deps.is_empty() || !names.iter().any(|name| deps.contains(name)) {
                    return;
                }
                let Some(owner) = owner.upgrade() else {
                    return;
                };
                // The owning node refreshes its registered commands itself.
                if owner.node().owns_command(id) {
                    return;
                }
                events.emit(&());
            })
    }
}
