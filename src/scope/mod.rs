//! Request scopes: per-unit-of-work instance stores and their teardown.
//!
//! A [`ScopeStore`] caches request-lifetime instances and remembers every
//! resource acquired while it was active. Stores are reached ambiently
//! through [`ScopeStore::current`], which consults the task-local slot of
//! the running tokio task first and the thread-local slot second. Entering a
//! scope installs a fresh store in whichever slot is active and returns a
//! [`ScopeToken`] that restores the previous occupant on exit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::key::{Key, Token};
use crate::registration::AnyArc;

mod ambient;
mod dispose_bag;

pub use ambient::{with_task_scope, ScopeToken};
pub(crate) use dispose_bag::{BoxFuture, Disposable, DisposeBag};
pub use dispose_bag::{TeardownError, TeardownErrorKind, TeardownReport};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a store. A store that does not exist yet is the
/// not-entered state; exited stores are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Entered,
    Exited,
}

/// Instance cache and resource list for one logical unit of work.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone)]
pub struct ScopeStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    id: u64,
    exited: AtomicBool,
    slots: Mutex<HashMap<Key, Arc<OnceCell<AnyArc>>>>,
    disposers: Mutex<DisposeBag>,
    published: Mutex<HashMap<Key, AnyArc>>,
}

impl ScopeStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                exited: AtomicBool::new(false),
                slots: Mutex::new(HashMap::new()),
                disposers: Mutex::new(DisposeBag::default()),
                published: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The ambient store of the current task or thread, if a scope is entered.
    pub fn current() -> Option<ScopeStore> {
        ambient::current()
    }

    /// Process-unique id, for logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> ScopeState {
        if self.inner.exited.load(Ordering::Acquire) {
            ScopeState::Exited
        } else {
            ScopeState::Entered
        }
    }

    /// Whether both handles point at the same store.
    pub fn same_as(&self, other: &ScopeStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Publishes an externally supplied object (for example the in-flight
    /// request) so that an ambient binding for `token` can hand it out.
    pub fn publish<T: Send + Sync + 'static>(&self, token: &Token<T>, value: T) {
        self.publish_arc(token, Arc::new(value));
    }

    /// Publishes an already shared object under `token`.
    pub fn publish_arc<T: Send + Sync + 'static>(&self, token: &Token<T>, value: Arc<T>) {
        self.inner
            .published
            .lock()
            .unwrap()
            .insert(*token.key(), value);
    }

    /// The object published under `token`.
    pub fn published<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        let key = token.key();
        let value = self
            .inner
            .published
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(DiError::AmbientNotPublished(key.display_name()))?;
        value
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Whether an instance for `key` has been built in this store.
    pub fn is_cached(&self, key: &Key) -> bool {
        self.inner
            .slots
            .lock()
            .unwrap()
            .get(key)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Number of resources waiting for release.
    pub fn pending_releases(&self) -> usize {
        self.inner.disposers.lock().unwrap().len()
    }

    /// Cache cell for `key`, created on first use.
    pub(crate) fn slot(&self, key: &Key) -> DiResult<Arc<OnceCell<AnyArc>>> {
        if self.state() == ScopeState::Exited {
            return Err(DiError::ScopeExited(key.display_name()));
        }
        Ok(self
            .inner
            .slots
            .lock()
            .unwrap()
            .entry(*key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone())
    }

    /// Records an acquired resource. Resources acquired after the store
    /// closed are released on the spot.
    pub(crate) fn push_disposable(&self, disposable: Disposable) {
        if self.state() == ScopeState::Exited {
            warn!(scope = self.id(), "resource acquired after scope exit; releasing immediately");
            let mut late = DisposeBag::default();
            late.push(disposable);
            late.run_all_sync_reverse();
            return;
        }
        self.inner.disposers.lock().unwrap().push(disposable);
    }

    /// Marks the store exited. Cached instances and published objects are
    /// dropped; acquired resources stay pending until released.
    pub(crate) fn close(&self) {
        self.inner.exited.store(true, Ordering::Release);
        self.inner.slots.lock().unwrap().clear();
        self.inner.published.lock().unwrap().clear();
    }

    /// Releases every pending resource in reverse order through its
    /// synchronous path.
    pub(crate) fn release_pending(&self) -> TeardownReport {
        let mut bag = std::mem::take(&mut *self.inner.disposers.lock().unwrap());
        bag.run_all_sync_reverse()
    }

    /// Releases pending resources in reverse order, awaiting asynchronous
    /// releases. Each resource leaves the store only when its release starts,
    /// so if this future is dropped the rest are still pending.
    pub(crate) async fn release_pending_async(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        while let Some(item) = self.pop_disposable() {
            let (token, outcome) = item.release().await;
            report.record(token, outcome);
        }
        report
    }

    fn pop_disposable(&self) -> Option<Disposable> {
        self.inner.disposers.lock().unwrap().pop()
    }
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("pending_releases", &self.pending_releases())
            .finish()
    }
}
