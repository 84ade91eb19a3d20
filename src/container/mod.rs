//! The container: registry of bindings plus the resolution entry points.
//!
//! Bindings are expected to be registered at startup, before concurrent
//! resolution begins. Binding takes a write lock on the registry, so a late
//! `bind` is memory-safe, but classification of already registered bindings
//! never changes afterwards.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::ContainerConfig;
use crate::dependency::Param;
use crate::descriptors::BindingDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::{Key, Token};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::registration::{AnyArc, Binding, Registry};
use crate::resolver::Resolution;
use crate::scope::{with_task_scope, ScopeStore, ScopeToken, TeardownReport};
use crate::source::{validate_params, Body, Shape, Source};
use crate::strategy::materialize;

mod inject;

pub use inject::{AsyncInjected, Injected};

/// Extra tokens for one `bind` call.
///
/// ```rust
/// use depin::{BindOptions, Container, Lifetime, Source, Token};
///
/// struct Mailer;
///
/// let container = Container::new();
/// let primary = Token::<Mailer>::named("mailer");
/// let legacy = Token::<Mailer>::named("smtp_mailer");
/// container
///     .bind_with(
///         Lifetime::Singleton,
///         Source::class::<Mailer>(vec![], |_| Ok(Mailer)),
///         BindOptions::new().abstract_as(&primary).alias(&legacy),
///     )
///     .unwrap();
///
/// let a = container.get(&primary).unwrap();
/// let b = container.get(&legacy).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// // The implementation's own token is not registered when an abstract token is given.
/// assert!(!container.contains(Token::<Mailer>::of().key()));
/// ```
pub struct BindOptions<T> {
    abstract_key: Option<Key>,
    aliases: Vec<Key>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: 'static> BindOptions<T> {
    pub fn new() -> Self {
        Self {
            abstract_key: None,
            aliases: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Registers under `token` instead of the source's own token.
    pub fn abstract_as(mut self, token: &Token<T>) -> Self {
        self.abstract_key = Some(*token.key());
        self
    }

    /// Additional token sharing the same binding and cached instances.
    pub fn alias(mut self, token: &Token<T>) -> Self {
        self.aliases.push(*token.key());
        self
    }
}

impl<T: 'static> Default for BindOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a [`Container`] with configuration and observers.
#[derive(Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    observers: Observers,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an observer notified of every resolution and scope event.
    pub fn observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Registry::default()),
                next_id: AtomicU64::new(1),
                observers: self.observers,
                config: self.config,
            }),
        }
    }
}

/// Dependency resolution container.
///
/// Cloning is cheap; clones share bindings and singleton instances.
///
/// # Examples
///
/// ```rust
/// use depin::{Container, Lifetime, Param, Source, Token};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct Counter(usize);
///
/// let built = Arc::new(AtomicUsize::new(0));
/// let container = Container::new();
/// let seen = built.clone();
/// container
///     .bind(
///         Lifetime::Request,
///         Source::class::<Counter>(vec![], move |_| Ok(Counter(seen.fetch_add(1, Ordering::SeqCst)))),
///     )
///     .unwrap();
///
/// let token = Token::<Counter>::of();
/// let (a, b) = container.scoped(|_| {
///     (container.get(&token).unwrap(), container.get(&token).unwrap())
/// });
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let c = container.scoped(|_| container.get(&token).unwrap());
/// assert!(!Arc::ptr_eq(&a, &c));
/// assert_eq!(built.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    observers: Observers,
    config: ContainerConfig,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        ContainerBuilder::new().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        ContainerBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    #[inline]
    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    #[inline]
    pub(crate) fn binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.inner.registry.read().unwrap().get(key)
    }

    pub(crate) fn supplier(&self, param: &Param) -> Option<Key> {
        self.inner.registry.read().unwrap().supplier(param)
    }

    /// Registers `source` under its own token.
    pub fn bind<T: Send + Sync + 'static>(&self, lifetime: Lifetime, source: Source<T>) -> DiResult<Token<T>> {
        self.bind_with(lifetime, source, BindOptions::new())
    }

    /// Registers `source` under an abstract token and/or aliases.
    ///
    /// Resource sources are rejected outside [`Lifetime::Request`]. The
    /// binding's synchronous/asynchronous classification is computed here,
    /// against the bindings registered so far, and never revisited; see
    /// [`stale_classifications`](Self::stale_classifications). Re-binding a
    /// binding's primary token replaces it along with its aliases; binding
    /// over one of its aliases only takes that token over.
    pub fn bind_with<T: Send + Sync + 'static>(
        &self,
        lifetime: Lifetime,
        source: Source<T>,
        options: BindOptions<T>,
    ) -> DiResult<Token<T>> {
        check_resource_lifetime(&source, lifetime)?;
        validate_params(source.name(), source.params())?;

        let primary = options.abstract_key.unwrap_or(*source.key());
        let keys = collect_keys(primary, options.aliases);
        let (shape, impl_name, provider_async) = (source.shape(), source.name(), source.is_async());
        let (params, body) = source.lower();
        self.install(lifetime, keys, shape, impl_name, provider_async, params, body);
        Ok(Token::from_key(primary))
    }

    /// Registers `source` under the trait-object token `token`.
    ///
    /// `upcast` turns each produced `Arc<I>` into the `Arc<Tr>` handed to
    /// callers of [`get_trait`](Self::get_trait) and to parameters read with
    /// [`Arguments::get_trait`](crate::Arguments::get_trait). Lifetimes,
    /// resources and aliases behave as for [`bind_with`](Self::bind_with).
    ///
    /// ```rust
    /// use depin::{Container, Lifetime, Source, Token};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    ///
    /// struct Fixed;
    /// impl Clock for Fixed {
    ///     fn now(&self) -> u64 { 42 }
    /// }
    ///
    /// let container = Container::new();
    /// let clock = Token::<dyn Clock>::of();
    /// container
    ///     .bind_trait(
    ///         Lifetime::Singleton,
    ///         &clock,
    ///         Source::class::<Fixed>(vec![], |_| Ok(Fixed)),
    ///         |fixed| fixed as Arc<dyn Clock>,
    ///     )
    ///     .unwrap();
    ///
    /// assert_eq!(container.get_trait(&clock).unwrap().now(), 42);
    /// ```
    pub fn bind_trait<I, Tr>(
        &self,
        lifetime: Lifetime,
        token: &Token<Tr>,
        source: Source<I>,
        upcast: impl Fn(Arc<I>) -> Arc<Tr> + Send + Sync + 'static,
    ) -> DiResult<Token<Tr>>
    where
        I: Send + Sync + 'static,
        Tr: ?Sized + Send + Sync + 'static,
    {
        self.bind_trait_with(lifetime, token, source, upcast, &[])
    }

    /// [`bind_trait`](Self::bind_trait) with extra trait-object aliases.
    pub fn bind_trait_with<I, Tr>(
        &self,
        lifetime: Lifetime,
        token: &Token<Tr>,
        source: Source<I>,
        upcast: impl Fn(Arc<I>) -> Arc<Tr> + Send + Sync + 'static,
        aliases: &[Token<Tr>],
    ) -> DiResult<Token<Tr>>
    where
        I: Send + Sync + 'static,
        Tr: ?Sized + Send + Sync + 'static,
    {
        check_resource_lifetime(&source, lifetime)?;
        validate_params(source.name(), source.params())?;

        let primary = *token.key();
        let keys = collect_keys(primary, aliases.iter().map(|alias| *alias.key()).collect());
        let (shape, impl_name, provider_async) = (source.shape(), source.name(), source.is_async());
        let (params, body) = source.lower();
        // Stored as `Arc<Arc<Tr>>` since `Arc<dyn Any>` cannot hold an unsized value.
        let body = body.map_value(move |value| {
            let concrete = downcast::<I>(value)?;
            Ok(Arc::new(upcast(concrete)) as AnyArc)
        });
        self.install(lifetime, keys, shape, impl_name, provider_async, params, body);
        debug!(token = primary.display_name(), implementation = impl_name, "bound trait object");
        Ok(Token::from_key(primary))
    }

    #[allow(clippy::too_many_arguments)]
    fn install(
        &self,
        lifetime: Lifetime,
        keys: Vec<Key>,
        shape: Shape,
        impl_name: &'static str,
        provider_async: bool,
        params: Vec<Param>,
        body: Body,
    ) {
        let primary = keys[0];
        let mut registry = self.inner.registry.write().unwrap();
        let is_async = provider_async || registry.needs_async(&params);
        let params: Arc<[Param]> = Arc::from(params);
        let strategy = materialize(lifetime, primary, impl_name, params.clone(), body, is_async);

        let binding = Arc::new(Binding {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            primary,
            lifetime,
            shape,
            is_async,
            impl_name,
            params,
            strategy,
        });
        registry.insert(binding, &keys);
        debug!(
            token = primary.display_name(),
            aliases = keys.len() - 1,
            lifetime = lifetime.as_str(),
            is_async,
            "bound provider"
        );
    }

    /// Exposes an object published into the request scope under `token`.
    ///
    /// Equivalent to [`register_ambient_in`](Self::register_ambient_in) with
    /// [`Lifetime::Request`].
    ///
    /// ```rust
    /// use depin::{Container, DiError, Token};
    ///
    /// struct Request { path: String }
    ///
    /// let container = Container::new();
    /// let current = Token::<Request>::named("current_request");
    /// container.register_ambient(&current).unwrap();
    ///
    /// container.scoped(|_| {
    ///     assert!(matches!(container.get(&current), Err(DiError::AmbientNotPublished(_))));
    /// });
    /// container.scoped(|store| {
    ///     store.publish(&current, Request { path: "/health".into() });
    ///     assert_eq!(container.get(&current).unwrap().path, "/health");
    /// });
    /// ```
    pub fn register_ambient<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Token<T>> {
        self.register_ambient_in(token, Lifetime::Request)
    }

    /// Exposes a published per-scope object under `token` with the given lifetime.
    pub fn register_ambient_in<T: Send + Sync + 'static>(
        &self,
        token: &Token<T>,
        lifetime: Lifetime,
    ) -> DiResult<Token<T>> {
        let token = *token;
        let source = Source::shared(*token.key(), Vec::new(), move |args| match args.scope() {
            Some(store) => store.published(&token),
            None => Err(DiError::NoActiveScope(token.key().display_name())),
        });
        self.bind(lifetime, source)
    }

    /// Resolves `token` on the synchronous path, using the ambient scope if one is entered.
    pub fn get<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        self.resolve_in(ScopeStore::current(), token)
    }

    /// Resolves `token`, awaiting asynchronous providers and dependencies.
    pub async fn get_async<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        self.resolve_in_async(ScopeStore::current(), token).await
    }

    /// Resolves the type token of `T`.
    pub fn get_type<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get(&Token::<T>::of())
    }

    pub async fn get_type_async<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get_async(&Token::<T>::of()).await
    }

    /// Resolves a trait-object token registered with [`bind_trait`](Self::bind_trait).
    pub fn get_trait<Tr: ?Sized + Send + Sync + 'static>(&self, token: &Token<Tr>) -> DiResult<Arc<Tr>> {
        downcast_trait(self.resolve_any_in(ScopeStore::current(), token.key())?)
    }

    pub async fn get_trait_async<Tr: ?Sized + Send + Sync + 'static>(&self, token: &Token<Tr>) -> DiResult<Arc<Tr>> {
        downcast_trait(self.resolve_any_in_async(ScopeStore::current(), token.key()).await?)
    }

    pub(crate) fn resolve_any_in(&self, scope: Option<ScopeStore>, key: &Key) -> DiResult<AnyArc> {
        Resolution::root(self.clone(), scope).resolve_sync(key)
    }

    pub(crate) async fn resolve_any_in_async(&self, scope: Option<ScopeStore>, key: &Key) -> DiResult<AnyArc> {
        Resolution::root(self.clone(), scope).resolve_async(*key).await
    }

    fn resolve_in<T: Send + Sync + 'static>(&self, scope: Option<ScopeStore>, token: &Token<T>) -> DiResult<Arc<T>> {
        downcast(self.resolve_any_in(scope, token.key())?)
    }

    async fn resolve_in_async<T: Send + Sync + 'static>(
        &self,
        scope: Option<ScopeStore>,
        token: &Token<T>,
    ) -> DiResult<Arc<T>> {
        downcast(self.resolve_any_in_async(scope, token.key()).await?)
    }

    /// Whether `key` has an active binding.
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.registry.read().unwrap().contains_key(key)
    }

    /// Whether `key` resolves only asynchronously; `None` when unbound.
    pub fn is_async(&self, key: &Key) -> Option<bool> {
        self.binding(key).map(|binding| binding.is_async)
    }

    /// Number of tokens (primary and alias) with an active binding.
    pub fn token_count(&self) -> usize {
        self.inner.registry.read().unwrap().len()
    }

    /// Every active binding, in registration order.
    pub fn descriptors(&self) -> Vec<BindingDescriptor> {
        let registry = self.inner.registry.read().unwrap();
        registry
            .bindings()
            .iter()
            .map(|binding| registry.descriptor(binding))
            .collect()
    }

    /// The binding reachable through `key`.
    pub fn descriptor(&self, key: &Key) -> Option<BindingDescriptor> {
        let registry = self.inner.registry.read().unwrap();
        registry.get(key).map(|binding| registry.descriptor(&binding))
    }

    /// Synchronous bindings that would be classified asynchronous if bound now.
    ///
    /// Classification is fixed at bind time, so a dependency that became
    /// asynchronous later (bound afterwards, or re-bound) leaves its
    /// dependents on the synchronous path, where resolving them fails with
    /// `AsyncLeak`. This only reports such bindings; it never changes them.
    pub fn stale_classifications(&self) -> Vec<BindingDescriptor> {
        let registry = self.inner.registry.read().unwrap();
        registry
            .bindings()
            .iter()
            .filter(|binding| !binding.is_async && registry.needs_async(&binding.params))
            .map(|binding| registry.descriptor(binding))
            .collect()
    }

    /// Enters a fresh request scope and makes it the ambient scope.
    ///
    /// # Panics
    ///
    /// On a tokio runtime thread outside [`with_task_scope`]; see
    /// [`try_enter_scope`](Self::try_enter_scope).
    pub fn enter_scope(&self) -> ScopeToken {
        match self.try_enter_scope() {
            Ok(token) => token,
            Err(err) => panic!("{}", err),
        }
    }

    /// Enters a fresh request scope, failing with
    /// [`DiError::TaskScopeRequired`] when the only slot available is the
    /// thread slot of a tokio runtime thread. Concurrent tasks on that
    /// thread would otherwise see each other's scope.
    ///
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use depin::{with_task_scope, Container, DiError};
    ///
    /// let container = Container::new();
    /// assert!(matches!(container.try_enter_scope(), Err(DiError::TaskScopeRequired)));
    ///
    /// with_task_scope(async {
    ///     let token = container.try_enter_scope().unwrap();
    ///     container.exit_scope_async(token).await;
    /// })
    /// .await;
    /// # }
    /// ```
    pub fn try_enter_scope(&self) -> DiResult<ScopeToken> {
        let token = ScopeToken::enter()?;
        self.inner.observers.scope_entered(token.store().id());
        Ok(token)
    }

    /// Releases the scope's resources in reverse acquisition order through
    /// their synchronous path, then restores the previous ambient scope.
    pub fn exit_scope(&self, token: ScopeToken) -> TeardownReport {
        let scope_id = token.store().id();
        let report = token.exit();
        self.inner.observers.scope_exited(scope_id, &report);
        report
    }

    /// Like [`exit_scope`](Self::exit_scope), awaiting asynchronous releases.
    pub async fn exit_scope_async(&self, token: ScopeToken) -> TeardownReport {
        let scope_id = token.store().id();
        let report = token.exit_async().await;
        self.inner.observers.scope_exited(scope_id, &report);
        report
    }

    /// Runs `f` inside a fresh scope and exits it on every path, unwinding included.
    ///
    /// The body cannot yield, so this works on runtime threads too.
    pub fn scoped<R>(&self, f: impl FnOnce(&ScopeStore) -> R) -> R {
        let token = ScopeToken::enter_unyielding();
        self.inner.observers.scope_entered(token.store().id());
        let output = f(token.store());
        self.exit_scope(token);
        output
    }

    /// Runs the future built by `f` inside a fresh task-local scope, then
    /// exits it asynchronously. If the returned future is dropped early the
    /// scope is released synchronously.
    ///
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use depin::{Container, Lifetime, Source, Token};
    ///
    /// let container = Container::new();
    /// container
    ///     .bind(Lifetime::Request, Source::async_factory("trace_id", vec![], |_| async { Ok(7u64) }))
    ///     .unwrap();
    ///
    /// let id = container
    ///     .scoped_async(|_store| async {
    ///         *container.get_async(&Token::<u64>::named("trace_id")).await.unwrap()
    ///     })
    ///     .await;
    /// assert_eq!(id, 7);
    /// # }
    /// ```
    pub async fn scoped_async<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce(ScopeStore) -> Fut,
        Fut: Future,
    {
        with_task_scope(async move {
            let token = self.enter_scope();
            let output = f(token.store().clone()).await;
            self.exit_scope_async(token).await;
            output
        })
        .await
    }

    /// Resolver bound to an explicit store instead of the ambient one.
    pub fn within(&self, store: &ScopeStore) -> ScopedResolver {
        ScopedResolver {
            container: self.clone(),
            store: store.clone(),
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("tokens", &self.token_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Resolves against a specific [`ScopeStore`], ignoring the ambient scope.
///
/// ```rust
/// use depin::{Container, Lifetime, Source, Token};
/// use std::sync::Arc;
///
/// struct Session;
///
/// let container = Container::new();
/// container.bind(Lifetime::Request, Source::class::<Session>(vec![], |_| Ok(Session))).unwrap();
///
/// let token = container.enter_scope();
/// let store = token.store().clone();
/// container.exit_scope(token);
///
/// // No ambient scope here; resolving through the exited store still fails clearly.
/// assert!(container.within(&store).get(&Token::<Session>::of()).is_err());
/// ```
#[derive(Clone)]
pub struct ScopedResolver {
    container: Container,
    store: ScopeStore,
}

impl ScopedResolver {
    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    pub fn get<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        self.container.resolve_in(Some(self.store.clone()), token)
    }

    pub async fn get_async<T: Send + Sync + 'static>(&self, token: &Token<T>) -> DiResult<Arc<T>> {
        self.container
            .resolve_in_async(Some(self.store.clone()), token)
            .await
    }

    pub fn get_trait<Tr: ?Sized + Send + Sync + 'static>(&self, token: &Token<Tr>) -> DiResult<Arc<Tr>> {
        downcast_trait(self.container.resolve_any_in(Some(self.store.clone()), token.key())?)
    }

    pub async fn get_trait_async<Tr: ?Sized + Send + Sync + 'static>(&self, token: &Token<Tr>) -> DiResult<Arc<Tr>> {
        downcast_trait(
            self.container
                .resolve_any_in_async(Some(self.store.clone()), token.key())
                .await?,
        )
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

/// Unwraps a value stored by [`Container::bind_trait`].
pub(crate) fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<Arc<T>>()
        .map(|stored| (*stored).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

fn check_resource_lifetime<T: Send + Sync + 'static>(source: &Source<T>, lifetime: Lifetime) -> DiResult<()> {
    if source.shape().is_resource() && lifetime != Lifetime::Request {
        return Err(DiError::InvalidRegistration(format!(
            "{} is a resource provider and can only be bound with Lifetime::Request, not {}",
            source.name(),
            lifetime
        )));
    }
    Ok(())
}

/// Primary first, then the aliases without repeats.
fn collect_keys(primary: Key, aliases: Vec<Key>) -> Vec<Key> {
    let mut keys = vec![primary];
    for alias in aliases {
        if !keys.contains(&alias) {
            keys.push(alias);
        }
    }
    keys
}
