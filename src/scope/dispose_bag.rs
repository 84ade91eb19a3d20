//! Ordered release of acquired resources.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;

/// Future type for release operations.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type SyncRelease = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;
type AsyncRelease = Box<dyn FnOnce() -> BoxFuture<Result<(), BoxError>> + Send>;

enum Release {
    Sync(SyncRelease),
    Async {
        release: AsyncRelease,
        blocking: Option<SyncRelease>,
    },
}

/// One acquired resource waiting for release.
pub(crate) struct Disposable {
    token: &'static str,
    release: Release,
}

impl Disposable {
    pub(crate) fn sync(token: &'static str, release: SyncRelease) -> Self {
        Self {
            token,
            release: Release::Sync(release),
        }
    }

    pub(crate) fn asynchronous(
        token: &'static str,
        release: AsyncRelease,
        blocking: Option<SyncRelease>,
    ) -> Self {
        Self {
            token,
            release: Release::Async { release, blocking },
        }
    }

    /// Runs the synchronous path: the sync release, or the blocking fallback
    /// of an async resource.
    fn release_blocking(self) -> (&'static str, Result<(), TeardownErrorKind>) {
        let outcome = match self.release {
            Release::Sync(release) => run_blocking(release),
            Release::Async {
                blocking: Some(blocking),
                ..
            } => run_blocking(blocking),
            Release::Async { blocking: None, .. } => Err(TeardownErrorKind::RequiresAsyncExit),
        };
        (self.token, outcome)
    }

    /// Runs the release, awaiting it when it is asynchronous.
    pub(crate) async fn release(self) -> (&'static str, Result<(), TeardownErrorKind>) {
        let outcome = match self.release {
            Release::Sync(release) => run_blocking(release),
            Release::Async { release, .. } => {
                (release)().await.map_err(|err| TeardownErrorKind::Failed(Arc::from(err)))
            }
        };
        (self.token, outcome)
    }
}

/// Why a single release step failed.
#[derive(Debug, Clone)]
pub enum TeardownErrorKind {
    /// The release step returned an error.
    Failed(Arc<dyn std::error::Error + Send + Sync>),
    /// The release step panicked.
    Panicked(String),
    /// An asynchronous resource with no blocking release was torn down by a
    /// synchronous exit.
    RequiresAsyncExit,
}

/// A release step that failed. Collected, logged, never propagated as `Err`.
#[derive(Debug, Clone)]
pub struct TeardownError {
    pub token: &'static str,
    pub kind: TeardownErrorKind,
}

impl std::fmt::Display for TeardownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TeardownErrorKind::Failed(err) => write!(f, "release of {} failed: {}", self.token, err),
            TeardownErrorKind::Panicked(msg) => write!(f, "release of {} panicked: {}", self.token, msg),
            TeardownErrorKind::RequiresAsyncExit => write!(
                f,
                "release of {} is asynchronous; exit the scope with exit_scope_async",
                self.token
            ),
        }
    }
}

impl std::error::Error for TeardownError {}

/// Outcome of tearing down one scope.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    /// Number of release steps attempted.
    pub released: usize,
    /// Release steps that failed, in the order they ran.
    pub failures: Vec<TeardownError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(&mut self, token: &'static str, outcome: Result<(), TeardownErrorKind>) {
        self.released += 1;
        if let Err(kind) = outcome {
            let failure = TeardownError { token, kind };
            warn!(token, error = %failure, "scope teardown step failed");
            self.failures.push(failure);
        }
    }
}

/// Resources in acquisition order, released LIFO.
#[derive(Default)]
pub(crate) struct DisposeBag {
    items: Vec<Disposable>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposable: Disposable) {
        self.items.push(disposable);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recently acquired resource still waiting for release.
    pub(crate) fn pop(&mut self) -> Option<Disposable> {
        self.items.pop()
    }

    /// Releases every resource in reverse order through its synchronous path.
    pub(crate) fn run_all_sync_reverse(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        while let Some(item) = self.items.pop() {
            let (token, outcome) = item.release_blocking();
            report.record(token, outcome);
        }
        report
    }
}

fn run_blocking(release: SyncRelease) -> Result<(), TeardownErrorKind> {
    match catch_unwind(AssertUnwindSafe(release)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TeardownErrorKind::Failed(Arc::from(err))),
        Err(payload) => Err(TeardownErrorKind::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
