//! Lifetime policies for bindings.

/// Lifetime policy controlling how often a provider runs and where its
/// result is cached.
///
/// # Examples
///
/// ```rust
/// use depin::{Container, Lifetime, Source, Token};
/// use std::sync::Arc;
///
/// struct Clock;
///
/// let container = Container::new();
/// container.bind(Lifetime::Singleton, Source::class::<Clock>(vec![], |_| Ok(Clock))).unwrap();
///
/// let a = container.get(&Token::<Clock>::of()).unwrap();
/// let b = container.get(&Token::<Clock>::of()).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Lifetime {
    /// Single instance per container, built lazily on first access.
    ///
    /// The provider runs at most once for the lifetime of the binding; every
    /// later request returns the memoized instance.
    Singleton,
    /// New instance per resolution, never cached.
    Transient,
    /// Single instance per entered request scope.
    ///
    /// The cache lives in the ambient [`ScopeStore`](crate::ScopeStore) and is
    /// discarded on scope exit. Resource-shaped sources are only accepted
    /// under this lifetime.
    Request,
}

impl Lifetime {
    /// Lowercase label used in logs and descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Transient => "transient",
            Lifetime::Request => "request",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
