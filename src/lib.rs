//! # depin
//!
//! Scope-aware dependency resolution for Rust: providers declare their
//! dependencies up front, and the container wires them together under
//! singleton, transient or request lifetimes.
//!
//! ## Features
//!
//! - **Three lifetimes**: Singleton, Transient and Request (per entered scope)
//! - **Sync and async paths**: asynchronous providers are classified at bind
//!   time and only resolve through `get_async`
//! - **Resources**: scoped acquire/release pairs torn down in reverse order on scope exit
//! - **Async-safe ambient scope**: each tokio task sees only the scope it entered
//! - **Circular dependency detection**: reported with the full resolution path
//! - **Trait-object tokens**: `Token<dyn Trait>` bound with `Container::bind_trait`
//!
//! ## Quick Start
//!
//! ```rust
//! use depin::{Container, Lifetime, Param, Source, Token};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container
//!     .bind(
//!         Lifetime::Singleton,
//!         Source::class::<Database>(vec![], |_| {
//!             Ok(Database { connection_string: "postgres://localhost".to_string() })
//!         }),
//!     )
//!     .unwrap();
//! container
//!     .bind(
//!         Lifetime::Transient,
//!         Source::class::<UserService>(vec![Param::typed::<Database>("db")], |args| {
//!             Ok(UserService { db: args.get::<Database>("db")? })
//!         }),
//!     )
//!     .unwrap();
//!
//! let users = container.get(&Token::<UserService>::of()).unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Lifetimes
//!
//! - **Singleton**: built once, on first access, and shared by every caller
//! - **Transient**: built fresh on every resolution
//! - **Request**: built once per entered request scope and released when it exits
//!
//! ## Request Scopes
//!
//! ```rust
//! use depin::{Container, Lifetime, Source, Token};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct RequestId(usize);
//!
//! let container = Container::new();
//! let counter = Arc::new(AtomicUsize::new(0));
//! let next = counter.clone();
//! container
//!     .bind(
//!         Lifetime::Request,
//!         Source::factory("request_id", vec![], move |_| Ok(RequestId(next.fetch_add(1, Ordering::SeqCst)))),
//!     )
//!     .unwrap();
//!
//! let token = Token::<RequestId>::named("request_id");
//! let (a, b) = container.scoped(|_| (container.get(&token).unwrap(), container.get(&token).unwrap()));
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! let c = container.scoped(|_| container.get(&token).unwrap());
//! assert_ne!(a.0, c.0);
//! ```

#[macro_use]
mod macros;

pub mod config;
pub mod container;
pub mod dependency;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod scope;
pub mod source;
pub mod traits;

// Internal modules
mod internal;
mod registration;
mod resolver;
mod strategy;

// Re-export core types
pub use config::ContainerConfig;
pub use container::{AsyncInjected, BindOptions, Container, ContainerBuilder, Injected, ScopedResolver};
pub use dependency::{Arguments, Inject, Overrides, Param, ParamKind};
pub use descriptors::BindingDescriptor;
pub use error::{BoxError, DiError, DiResult};
pub use key::{key_of_type, Key, Token};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, LoggingObserver, MetricsObserver};
pub use scope::{
    with_task_scope, ScopeState, ScopeStore, ScopeToken, TeardownError, TeardownErrorKind, TeardownReport,
};
pub use source::{Shape, Source};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
