//! Resolver traits for token resolution.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::container::{downcast_trait, Container, ScopedResolver};
use crate::error::{DiError, DiResult};
use crate::key::{Key, Token};
use crate::scope::ScopeStore;

/// Core resolver trait for object-safe resolution.
///
/// Implemented by [`Container`] (ambient scope) and [`ScopedResolver`]
/// (explicit scope). Most callers use [`Resolver`] instead.
#[async_trait]
pub trait ResolverCore: Send + Sync {
    /// Resolves `key` on the synchronous path.
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Resolves `key` on the asynchronous path.
    async fn resolve_any_async(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Request scope resolutions run in, if any.
    fn active_scope(&self) -> Option<ScopeStore>;
}

/// Typed resolution on top of [`ResolverCore`].
///
/// ```
/// use depin::{Container, Lifetime, Resolver, Source, Token};
///
/// fn port(resolver: &dyn depin::ResolverCore) -> u16 {
///     let any = resolver.resolve_any(Token::<u16>::named("port").key()).unwrap();
///     *any.downcast::<u16>().unwrap()
/// }
///
/// let container = Container::new();
/// container.bind(Lifetime::Singleton, Source::factory("port", vec![], |_| Ok(8080u16))).unwrap();
///
/// assert_eq!(*container.resolve(&Token::<u16>::named("port")).unwrap(), 8080);
/// assert_eq!(port(&container), 8080);
/// ```
#[async_trait]
pub trait Resolver: ResolverCore {
    fn resolve<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        let any = self.resolve_any(token.key())?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    async fn resolve_async<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        let any = self.resolve_any_async(token.key()).await?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a trait-object token bound with
    /// [`Container::bind_trait`](crate::Container::bind_trait).
    fn resolve_trait<T: ?Sized + Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any(token.key())?)
    }

    async fn resolve_trait_async<T: ?Sized + Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any_async(token.key()).await?)
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

#[async_trait]
impl ResolverCore for Container {
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.resolve_any_in(ScopeStore::current(), key)
    }

    async fn resolve_any_async(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.resolve_any_in_async(ScopeStore::current(), key).await
    }

    fn active_scope(&self) -> Option<ScopeStore> {
        ScopeStore::current()
    }
}

#[async_trait]
impl ResolverCore for ScopedResolver {
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.container().resolve_any_in(Some(self.store().clone()), key)
    }

    async fn resolve_any_async(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.container()
            .resolve_any_in_async(Some(self.store().clone()), key)
            .await
    }

    fn active_scope(&self) -> Option<ScopeStore> {
        Some(self.store().clone())
    }
}
