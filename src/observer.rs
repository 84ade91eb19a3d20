//! Diagnostic observers for resolution and scope lifecycle events.
//!
//! Observers receive a callback for every resolution the container performs
//! (including nested ones) and for every scope it enters or exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::scope::TeardownReport;
use crate::Key;

/// Hook for observing container events.
///
/// Observer calls are made synchronously during resolution. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use depin::{Container, DiObserver, Key, Lifetime, Source, Token};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     seen: Mutex<Vec<&'static str>>,
/// }
///
/// impl DiObserver for Recorder {
///     fn resolving(&self, key: &Key) {
///         self.seen.lock().unwrap().push(key.display_name());
///     }
///
///     fn resolved(&self, _key: &Key, _duration: Duration) {}
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let container = Container::builder().observer(recorder.clone()).build();
/// container
///     .bind(Lifetime::Transient, Source::factory("answer", vec![], |_| Ok(42u32)))
///     .unwrap();
/// container.get(&Token::<u32>::named("answer")).unwrap();
///
/// assert_eq!(*recorder.seen.lock().unwrap(), vec!["answer"]);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a binding's strategy runs.
    fn resolving(&self, key: &Key);

    /// Called after a binding resolved successfully.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called when resolution of `key` failed. Nested failures are reported
    /// once per level they pass through.
    fn resolution_failed(&self, key: &Key, error: &DiError) {
    }

    /// Called after a scope was entered.
    fn scope_entered(&self, scope_id: u64) {
    }

    /// Called after a scope finished its teardown.
    fn scope_exited(&self, scope_id: u64, report: &TeardownReport) {
    }
}

/// Registered observers.
///
/// Has minimal overhead when no observers are registered.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn resolution_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(key, error);
        }
    }

    pub(crate) fn scope_entered(&self, scope_id: u64) {
        for observer in &self.observers {
            observer.scope_entered(scope_id);
        }
    }

    pub(crate) fn scope_exited(&self, scope_id: u64, report: &TeardownReport) {
        for observer in &self.observers {
            observer.scope_exited(scope_id, report);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// Emits nothing when the crate is built without the `tracing` feature.
///
/// ```
/// use depin::{Container, LoggingObserver};
/// use std::sync::Arc;
///
/// let container = Container::builder()
///     .observer(Arc::new(LoggingObserver::with_prefix("billing")))
///     .build();
/// # let _ = container;
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "depin".to_string(),
        }
    }

    /// Observer whose events carry `prefix` as their `container` field.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
impl DiObserver for LoggingObserver {
    fn resolving(&self, key: &Key) {
        trace!(container = %self.prefix, token = key.display_name(), "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        debug!(container = %self.prefix, token = key.display_name(), ?duration, "resolved");
    }

    fn resolution_failed(&self, key: &Key, error: &DiError) {
        warn!(container = %self.prefix, token = key.display_name(), %error, "resolution failed");
    }

    fn scope_entered(&self, scope_id: u64) {
        trace!(container = %self.prefix, scope = scope_id, "scope entered");
    }

    fn scope_exited(&self, scope_id: u64, report: &TeardownReport) {
        debug!(
            container = %self.prefix,
            scope = scope_id,
            released = report.released,
            failures = report.failures.len(),
            "scope exited"
        );
    }
}

/// Observer that counts resolutions, failures and scopes.
///
/// ```
/// use depin::{Container, Lifetime, MetricsObserver, Source, Token};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let container = Container::builder().observer(metrics.clone()).build();
/// container
///     .bind(Lifetime::Transient, Source::factory("zero", vec![], |_| Ok(0u8)))
///     .unwrap();
///
/// container.get(&Token::<u8>::named("zero")).unwrap();
/// assert!(container.get(&Token::<u8>::named("missing")).is_err());
///
/// assert_eq!(metrics.resolution_count(), 1);
/// assert_eq!(metrics.failure_count(), 0);
/// ```
pub struct MetricsObserver {
    resolution_count: AtomicU64,
    failure_count: AtomicU64,
    total_resolution_time: AtomicU64,
    scopes_entered: AtomicU64,
    teardown_failures: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self {
            resolution_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_resolution_time: AtomicU64::new(0),
            scopes_entered: AtomicU64::new(0),
            teardown_failures: AtomicU64::new(0),
        }
    }

    /// Successful resolutions observed, nested ones included.
    pub fn resolution_count(&self) -> u64 {
        self.resolution_count.load(Ordering::Relaxed)
    }

    /// Failed resolutions of registered tokens. Lookups of unregistered
    /// tokens never reach a strategy and are not counted.
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        let total_ns = self.total_resolution_time.load(Ordering::Relaxed);
        Some(Duration::from_nanos(total_ns / count))
    }

    pub fn scopes_entered(&self) -> u64 {
        self.scopes_entered.load(Ordering::Relaxed)
    }

    /// Release steps that failed across all exited scopes.
    pub fn teardown_failures(&self) -> u64 {
        self.teardown_failures.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.resolution_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.total_resolution_time.store(0, Ordering::Relaxed);
        self.scopes_entered.store(0, Ordering::Relaxed);
        self.teardown_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for MetricsObserver {
    fn resolving(&self, _key: &Key) {}

    fn resolved(&self, _key: &Key, duration: Duration) {
        self.resolution_count.fetch_add(1, Ordering::Relaxed);
        self.total_resolution_time
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn resolution_failed(&self, _key: &Key, _error: &DiError) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn scope_entered(&self, _scope_id: u64) {
        self.scopes_entered.fetch_add(1, Ordering::Relaxed);
    }

    fn scope_exited(&self, _scope_id: u64, report: &TeardownReport) {
        self.teardown_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
    }
}
