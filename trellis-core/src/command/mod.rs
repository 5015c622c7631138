//! Commands
//!
//! A command is an action bound to a context view-model. It exposes
//! "can execute" and "execute", and raises can-execute-changed whenever a
//! context property it declared a dependency on is notified, so a bound
//! button can enable and disable itself.
//!
//! # Kinds
//!
//! - [`Command`]: synchronous; its behaviour implements [`CommandBehavior`].
//! - [`AsyncCommand`]: asynchronous; tracks in-flight executions through
//!   `IsWorking` and refuses to start another one unless concurrent
//!   execution is allowed.
//!
//! # Dependencies
//!
//! The behaviour declares its dependencies next to its `can_execute`
//! override via `can_execute_depends_on`. Two paths deliver them:
//!
//! 1. A command registered in its context's command map is refreshed by the
//!    view-model node once per mutation.
//! 2. A command that only has the context as parent listens to the
//!    context's `notified` batches itself. It ignores batches from a context
//!    that also owns it, so each mutation raises at most one
//!    can-execute-changed.
//!
//! The context is held weakly; a command whose context is gone cannot
//! execute.

mod async_command;
mod binding;
mod sync;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::notify::EventHandlers;

pub use async_command::{AsyncCommand, AsyncCommandBehavior};
pub use sync::{Command, CommandBehavior};

/// Unique identity of one command instance.
///
/// Names are shared by every instance of a command type; ids are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(u64);

impl CommandId {
    /// Generate a new unique command ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a command, as stored in a view-model's command map.
pub trait CommandHandle: Send + Sync {
    /// Instance identity.
    fn id(&self) -> CommandId;

    /// Registry key. Defaults to the behaviour's type name.
    fn name(&self) -> &'static str;

    /// Context properties whose changes affect "can execute".
    fn can_execute_depends_on(&self) -> &[&'static str];

    /// The can-execute-changed event.
    fn can_execute_changed(&self) -> &EventHandlers<()>;

    /// Raise can-execute-changed.
    fn raise_can_execute_changed(&self) {
        self.can_execute_changed().emit(&());
    }

    /// Whether any of `names` is a declared dependency.
    fn depends_on_any(&self, names: &[&str]) -> bool {
        let deps = self.can_execute_depends_on();
        names
            .iter()
            .any(|name| deps.iter().any(|dep| dep == name))
    }
}

impl fmt::Debug for dyn CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
