//! Error types for the dependency resolution runtime.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error returned by provider bodies and release steps.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Dependency resolution errors
///
/// Every variant is a startup or programming fault: nothing in the crate
/// retries, and callers are expected to fix the wiring rather than retry.
///
/// # Examples
///
/// ```rust
/// use depin::{Container, DiError, Token};
///
/// struct Unbound;
///
/// let container = Container::new();
/// match container.get(&Token::<Unbound>::of()) {
///     Err(DiError::MissingBinding { parameter: None, .. }) => {}
///     other => panic!("unexpected: {:?}", other.map(|_| ())),
/// }
/// ```
///
/// ```rust
/// use depin::DiError;
///
/// let circular = DiError::Circular(vec!["A", "B", "A"]);
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// No active binding for a requested token, or a required parameter has
    /// neither a binding nor a literal default.
    MissingBinding {
        /// Token that could not be resolved.
        token: &'static str,
        /// Parameter being supplied, when the failure happened while binding parameters.
        parameter: Option<&'static str>,
        /// Provider owning that parameter.
        owner: Option<&'static str>,
    },
    /// The synchronous path reached a binding that can only resolve asynchronously.
    AsyncLeak {
        /// The asynchronous token reached.
        token: &'static str,
        /// Parameter being supplied, if any.
        parameter: Option<&'static str>,
        /// Provider owning that parameter.
        owner: Option<&'static str>,
    },
    /// Malformed `bind` call, rejected eagerly at bind time.
    InvalidRegistration(String),
    /// Resolved value is not of the requested type.
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    Circular(Vec<&'static str>),
    /// Maximum resolution depth exceeded
    DepthExceeded(usize),
    /// A request-lifetime binding was resolved with no scope entered.
    NoActiveScope(&'static str),
    /// A request-lifetime binding was resolved against a scope that already exited.
    ScopeExited(&'static str),
    /// An ambient token was resolved before its object was published into the scope.
    AmbientNotPublished(&'static str),
    /// A scope was entered on a tokio runtime thread without a task-local
    /// slot, where every task on the thread would share it.
    TaskScopeRequired,
    /// The provider body itself failed.
    Provider {
        /// Token whose provider failed.
        token: &'static str,
        /// Underlying failure.
        source: Arc<dyn Error + Send + Sync>,
    },
}

impl DiError {
    /// Wraps a provider failure for `token`.
    pub fn provider(token: &'static str, source: impl Into<BoxError>) -> Self {
        DiError::Provider {
            token,
            source: Arc::from(source.into()),
        }
    }

    /// Attaches the parameter currently being bound to a missing-binding or
    /// async-leak error that has none yet.
    pub(crate) fn in_parameter(self, name: &'static str, owning: &'static str) -> Self {
        match self {
            DiError::MissingBinding { token, parameter: None, .. } => DiError::MissingBinding {
                token,
                parameter: Some(name),
                owner: Some(owning),
            },
            DiError::AsyncLeak { token, parameter: None, .. } => DiError::AsyncLeak {
                token,
                parameter: Some(name),
                owner: Some(owning),
            },
            other => other,
        }
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::MissingBinding { token, parameter: Some(param), owner } => write!(
                f,
                "Cannot resolve parameter '{}' (type: {}) for {}: missing binding or default value",
                param,
                token,
                owner.unwrap_or("<unknown>")
            ),
            DiError::MissingBinding { token, parameter: None, .. } => {
                write!(f, "Binding for {} not registered", token)
            }
            DiError::AsyncLeak { token, parameter: Some(param), owner } => write!(
                f,
                "Parameter '{}' of {} depends on asynchronous provider {}; resolve it with get_async",
                param,
                owner.unwrap_or("<unknown>"),
                token
            ),
            DiError::AsyncLeak { token, parameter: None, .. } => write!(
                f,
                "{} resolves asynchronously; resolve it with get_async",
                token
            ),
            DiError::InvalidRegistration(msg) => write!(f, "Invalid registration: {}", msg),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::Circular(path) => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
            DiError::DepthExceeded(depth) => write!(f, "Max depth {} exceeded", depth),
            DiError::NoActiveScope(name) => {
                write!(f, "No request scope entered while resolving {}", name)
            }
            DiError::ScopeExited(name) => {
                write!(f, "Request scope already exited while resolving {}", name)
            }
            DiError::AmbientNotPublished(name) => write!(
                f,
                "No {} published in the current request scope; publish it before resolving",
                name
            ),
            DiError::TaskScopeRequired => write!(
                f,
                "Scope entered on a tokio runtime thread outside with_task_scope; use scoped_async or with_task_scope"
            ),
            DiError::Provider { token, source } => {
                write!(f, "Provider for {} failed: {}", token, source)
            }
        }
    }
}

impl Error for DiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DiError::Provider { source, .. } => Some(source.as_ref() as &(dyn Error + 'static)),
            _ => None,
        }
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
