//! Ambient scope slots with save/restore semantics.
//!
//! Two slots exist. Inside [`with_task_scope`] the slot belongs to the tokio
//! task and survives suspension points; elsewhere a thread-local slot is
//! used. Each [`ScopeToken`] remembers which slot it wrote to and what it
//! displaced, so exit puts back exactly the previous occupant.
//!
//! Every task polled on a runtime thread shares that thread's slot, so a
//! scope that may be held across an `.await` is refused the thread slot
//! while a runtime is driving the thread.

use std::cell::RefCell;
use std::future::Future;

use super::{ScopeStore, TeardownReport};
use crate::error::{DiError, DiResult};

thread_local! {
    static THREAD_SCOPE: RefCell<Option<ScopeStore>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_SCOPE: RefCell<Option<ScopeStore>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Task,
    Thread,
}

fn active_slot() -> Slot {
    if TASK_SCOPE.try_with(|_| ()).is_ok() {
        Slot::Task
    } else {
        Slot::Thread
    }
}

/// Slot for a scope that may outlive a suspension point.
fn yield_safe_slot() -> DiResult<Slot> {
    match active_slot() {
        Slot::Thread if tokio::runtime::Handle::try_current().is_ok() => Err(DiError::TaskScopeRequired),
        slot => Ok(slot),
    }
}

/// Puts `value` into `slot`, returning the previous occupant.
fn swap(slot: Slot, value: Option<ScopeStore>) -> Option<ScopeStore> {
    match slot {
        Slot::Task => match TASK_SCOPE.try_with(|cell| cell.replace(value)) {
            Ok(previous) => previous,
            Err(_) => {
                warn!("task-local scope slot is gone; previous scope not restored");
                None
            }
        },
        Slot::Thread => THREAD_SCOPE.with(|cell| cell.replace(value)),
    }
}

pub(super) fn current() -> Option<ScopeStore> {
    match TASK_SCOPE.try_with(|cell| cell.borrow().clone()) {
        Ok(store) => store,
        Err(_) => THREAD_SCOPE.with(|cell| cell.borrow().clone()),
    }
}

/// Runs `fut` with its own task-local scope slot.
///
/// Scopes entered inside `fut` are invisible to every other task, even when
/// tasks interleave on one thread. On a runtime thread outside such a block,
/// `enter_scope` fails with [`DiError::TaskScopeRequired`].
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use depin::{with_task_scope, Container, ScopeStore};
///
/// let container = Container::new();
/// with_task_scope(async {
///     let token = container.enter_scope();
///     tokio::task::yield_now().await;
///     assert!(ScopeStore::current().is_some());
///     container.exit_scope_async(token).await;
/// })
/// .await;
/// assert!(ScopeStore::current().is_none());
/// # }
/// ```
pub async fn with_task_scope<F: Future>(fut: F) -> F::Output {
    TASK_SCOPE.scope(RefCell::new(None), fut).await
}

/// Handle returned by entering a scope; exit it exactly once.
///
/// Dropping a token without exiting releases the scope's resources
/// synchronously and restores the previous ambient scope, so panics and
/// cancelled futures still tear down.
#[must_use = "a scope must be exited with exit_scope or exit_scope_async"]
pub struct ScopeToken {
    store: ScopeStore,
    previous: Option<ScopeStore>,
    slot: Slot,
    finished: bool,
}

impl ScopeToken {
    /// Enters a scope that may be held across `.await` points.
    pub(crate) fn enter() -> DiResult<Self> {
        Ok(Self::enter_in(yield_safe_slot()?))
    }

    /// Enters a scope that is exited before the caller can yield, so the
    /// thread slot is safe even on a runtime thread.
    pub(crate) fn enter_unyielding() -> Self {
        Self::enter_in(active_slot())
    }

    fn enter_in(slot: Slot) -> Self {
        let store = ScopeStore::new();
        let previous = swap(slot, Some(store.clone()));
        trace!(scope = store.id(), nested = previous.is_some(), "entered scope");
        Self {
            store,
            previous,
            slot,
            finished: false,
        }
    }

    /// The store this token owns.
    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    pub(crate) fn exit(mut self) -> TeardownReport {
        self.store.close();
        let report = self.store.release_pending();
        self.restore();
        report
    }

    /// Resources not yet reached when this future is dropped are released
    /// synchronously by the token's `Drop`.
    pub(crate) async fn exit_async(mut self) -> TeardownReport {
        self.store.close();
        let report = self.store.release_pending_async().await;
        self.restore();
        report
    }

    fn restore(&mut self) {
        self.finished = true;
        swap(self.slot, self.previous.take());
        trace!(scope = self.store.id(), "exited scope");
    }
}

impl Drop for ScopeToken {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(scope = self.store.id(), "scope token dropped without exit; releasing synchronously");
        self.store.close();
        self.store.release_pending();
        self.restore();
    }
}

impl std::fmt::Debug for ScopeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeToken")
            .field("store", &self.store)
            .field("slot", &self.slot)
            .finish()
    }
}
