//! Disposal traits for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for values bound through [`Source::disposable`](crate::Source::disposable);
/// `dispose` runs when the owning scope exits, in reverse acquisition order.
///
/// # Examples
///
/// ```
/// use depin::{Container, Dispose, Lifetime, Source, Token};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct Cache {
///     flushed: Arc<AtomicBool>,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let flushed = Arc::new(AtomicBool::new(false));
/// let flag = flushed.clone();
/// let container = Container::new();
/// container
///     .bind(
///         Lifetime::Request,
///         Source::disposable("user_cache", vec![], move |_| Ok(Cache { flushed: flag.clone() })),
///     )
///     .unwrap();
///
/// container.scoped(|_| container.get(&Token::<Cache>::named("user_cache")).unwrap());
/// assert!(flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource disposal.
///
/// Implement this for values bound through
/// [`Source::async_disposable`](crate::Source::async_disposable); `dispose`
/// is awaited by `exit_scope_async`.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use depin::{AsyncDispose, Container, Lifetime, Source, Token};
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) {
///         // close the connection gracefully
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let container = Container::new();
/// container
///     .bind(
///         Lifetime::Request,
///         Source::async_disposable("db_client", vec![], |_| async {
///             Ok(DatabaseClient { connection_id: "conn_123".to_string() })
///         }),
///     )
///     .unwrap();
///
/// let report = container
///     .scoped_async(|_| async {
///         let client = container.get_async(&Token::<DatabaseClient>::named("db_client")).await.unwrap();
///         assert_eq!(client.connection_id, "conn_123");
///     })
///     .await;
/// # let _ = report;
/// # }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self);
}
