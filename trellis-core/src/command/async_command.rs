//! Asynchronous commands.
//!
//! An [`AsyncCommand`] counts its in-flight executions. `IsWorking` is true
//! while the count is above zero, and unless concurrent execution is allowed
//! the command reports that it cannot execute while one is running.
//!
//! The count is checked and incremented under one lock, so two executions
//! racing from different tasks cannot both start when concurrency is off.
//! The increment is paired with a guard whose `Drop` releases the
//! count, so success, failure, panic and cancellation of the future all
//! restore it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::notify::EventHandlers;
use crate::viewmodel::ViewModel;

use super::binding::ContextBinding;
use super::{CommandHandle, CommandId};

/// The overridable half of an asynchronous command.
#[async_trait]
pub trait AsyncCommandBehavior<C, P = ()>: Send + Sync + 'static
where
    C: Send + Sync + 'static,
    P: Send + 'static,
{
    /// Registry key. Every instance of one behaviour type shares it.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Context properties whose changes affect [`can_execute`](Self::can_execute).
    fn can_execute_depends_on(&self) -> &[&'static str] {
        &[]
    }

    /// Whether the command may run against `context`, ignoring `IsWorking`.
    fn can_execute(&self, context: &C, parameter: &P) -> bool {
        let _ = (context, parameter);
        true
    }

    /// Run the command. Errors are returned to whoever awaits
    /// [`AsyncCommand::execute_async`].
    async fn execute(&self, context: Arc<C>, parameter: P) -> Result<()>;
}

struct AsyncInner<C, B, P> {
    binding: ContextBinding<C>,
    behavior: B,
    working: Mutex<usize>,
    allows_concurrent: AtomicBool,
    _parameter: PhantomData<fn(P)>,
}

impl<C: ViewModel, B, P> AsyncInner<C, B, P> {
    fn allows_concurrent(&self) -> bool {
        self.allows_concurrent.load(Ordering::Acquire)
    }

    /// Signals raised when the working count enters or leaves zero.
    fn raise_working_changed(&self) {
        self.binding.notifier().property_changed().emit(IS_WORKING);
        if !self.allows_concurrent() {
            self.binding.can_execute_changed().emit(&());
        }
    }
}

const IS_WORKING: &str = "IsWorking";
const ALLOWS_CONCURRENT_EXECUTION: &str = "AllowsConcurrentExecution";

/// Releases one unit of the working count on drop.
struct WorkingGuard<C: ViewModel, B, P> {
    inner: Arc<AsyncInner<C, B, P>>,
}

impl<C: ViewModel, B, P> WorkingGuard<C, B, P> {
    /// Increment the count unless that would start a second execution while
    /// concurrency is off.
    fn enter(inner: &Arc<AsyncInner<C, B, P>>) -> Option<Self> {
        let started = {
            let mut working = inner.working.lock();
            if *working > 0 && !inner.allows_concurrent() {
                return None;
            }
            *working += 1;
            *working == 1
        };
        if started {
            inner.raise_working_changed();
        }
        Some(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl<C: ViewModel, B, P> Drop for WorkingGuard<C, B, P> {
    fn drop(&mut self) {
        let finished = {
            let mut working = self.inner.working.lock();
            *working = working.saturating_sub(1);
            *working == 0
        };
        if finished {
            self.inner.raise_working_changed();
        }
    }
}

/// An asynchronous command bound weakly to a context view-model.
///
/// Cloning the command shares its state, including the working count.
pub struct AsyncCommand<C, B, P = ()> {
    inner: Arc<AsyncInner<C, B, P>>,
}

impl<C, B, P> AsyncCommand<C, B, P>
where
    C: ViewModel,
    B: AsyncCommandBehavior<C, P>,
    P: Send + 'static,
{
    /// Name of the working flag property.
    pub const IS_WORKING: &'static str = IS_WORKING;
    /// Name of the concurrency option property.
    pub const ALLOWS_CONCURRENT_EXECUTION: &'static str = ALLOWS_CONCURRENT_EXECUTION;

    /// Create an unbound command. Concurrent execution is off.
    pub fn new(behavior: B) -> Self {
        Self {
            inner: Arc::new(AsyncInner {
                binding: ContextBinding::new(),
                behavior,
                working: Mutex::new(0),
                allows_concurrent: AtomicBool::new(false),
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

    pub fn id(&self) -> CommandId {
        self.inner.binding.id()
    }

    pub fn name(&self) -> &'static str {
        self.inner.behavior.name()
    }

    pub fn behavior(&self) -> &B {
        &self.inner.behavior
    }

    /// The context view-model, if still alive.
    pub fn parent(&self) -> Option<Arc<C>> {
        self.inner.binding.context()
    }

    /// Rebind to a new context.
    pub fn set_parent(&self, context: Option<&Arc<C>>) -> bool {
        self.inner
            .binding
            .set_parent(context, self.inner.behavior.can_execute_depends_on())
    }

    /// Whether at least one execution is in flight.
    pub fn is_working(&self) -> bool {
        *self.inner.working.lock() > 0
    }

    pub fn allows_concurrent_execution(&self) -> bool {
        self.inner.allows_concurrent()
    }

    /// Allow or forbid overlapping executions.
    pub fn set_allows_concurrent_execution(&self, allow: bool) -> bool {
        if self.inner.allows_concurrent.swap(allow, Ordering::AcqRel) == allow {
            return false;
        }
        self.inner
            .binding
            .notifier()
            .property_changed()
            .emit(ALLOWS_CONCURRENT_EXECUTION);
        self.inner.binding.can_execute_changed().emit(&());
        true
    }

    /// Whether an execution may start now.
    pub fn can_execute(&self, parameter: &P) -> bool {
        if self.is_working() && !self.allows_concurrent_execution() {
            return false;
        }
        self.parent()
            .is_some_and(|context| self.inner.behavior.can_execute(&context, parameter))
    }

    /// Run the command and wait for it.
    ///
    /// Returns `Ok(false)` without side effects if the command cannot execute.
    pub async fn execute_async(&self, parameter: P) -> Result<bool> {
        let Some(context) = self.parent() else {
            tracing::debug!(command = self.name(), "no live context, execution skipped");
            return Ok(false);
        };
        if !self.inner.behavior.can_execute(&context, &parameter) {
            return Ok(false);
        }
        let Some(_guard) = WorkingGuard::enter(&self.inner) else {
            tracing::trace!(command = self.name(), "already working, execution skipped");
            return Ok(false);
        };

        tracing::debug!(command = self.name(), "executing");
        self.inner.behavior.execute(context, parameter).await?;
        Ok(true)
    }

    /// Start the command on the current tokio runtime without waiting.
    ///
    /// Failures are logged and also surface through the returned handle.
    pub fn execute(&self, parameter: P) -> Result<JoinHandle<Result<bool>>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let command = self.clone();
        Ok(runtime.spawn(async move {
            let outcome = command.execute_async(parameter).await;
            if let Err(err) = &outcome {
                tracing::warn!(command = command.name(), %err, "command execution failed");
            }
            outcome
        }))
    }

    /// Raised when "can execute" may have changed.
    pub fn can_execute_changed(&self) -> &EventHandlers<()> {
        self.inner.binding.can_execute_changed()
    }

    pub fn raise_can_execute_changed(&self) {
        self.inner.binding.can_execute_changed().emit(&());
    }

    /// Raised for `Parent`, `IsWorking` and `AllowsConcurrentExecution`.
    pub fn property_changed(&self) -> &EventHandlers<str> {
        self.inner.binding.notifier().property_changed()
    }

    /// Type-erased handle for a view-model's command map.
    pub fn handle(&self) -> Arc<dyn CommandHandle> {
        Arc::new(self.clone())
    }
}

impl<C, B, P> CommandHandle for AsyncCommand<C, B, P>
where
    C: ViewModel,
    B: AsyncCommandBehavior<C, P>,
    P: Send + 'static,
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

impl<C, B, P> Clone for AsyncCommand<C, B, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, B, P> fmt::Debug for AsyncCommand<C, B, P>
where
    C: ViewModel,
    B: AsyncCommandBehavior<C, P>,
    P: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCommand")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("is_working", &self.is_working())
            .field("allows_concurrent", &self.allows_concurrent_execution())
            .finish()
    }
}
