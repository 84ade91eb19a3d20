//! Function injection: ad-hoc functions whose parameters the container supplies.

use std::future::Future;
use std::sync::Arc;

use super::Container;
use crate::dependency::{Arguments, Overrides, Param};
use crate::error::DiResult;
use crate::resolver::{resolve_arguments, resolve_arguments_async, Resolution};
use crate::scope::{BoxFuture, ScopeStore};
use crate::source::validate_params;

type SyncCall<R> = Arc<dyn Fn(Arguments) -> DiResult<R> + Send + Sync>;
type AsyncCall<R> = Arc<dyn Fn(Arguments) -> BoxFuture<DiResult<R>> + Send + Sync>;

/// Function whose declared parameters are resolved on every call.
///
/// Values passed through [`Overrides`] always win over resolution.
///
/// ```rust
/// use depin::{Container, Lifetime, Overrides, Param, Source};
///
/// struct Greeter { greeting: &'static str }
///
/// let container = Container::new();
/// container
///     .bind(Lifetime::Singleton, Source::class::<Greeter>(vec![], |_| Ok(Greeter { greeting: "hello" })))
///     .unwrap();
///
/// let greet = container
///     .inject(
///         "greet",
///         vec![Param::typed::<Greeter>("greeter"), Param::untyped("name").with_default()],
///         |args| {
///             let greeter = args.get::<Greeter>("greeter")?;
///             let name = args.get_or::<String>("name", "world".to_string())?;
///             Ok(format!("{}, {}", greeter.greeting, name))
///         },
///     )
///     .unwrap();
///
/// assert_eq!(greet.call().unwrap(), "hello, world");
/// assert_eq!(greet.call_with(Overrides::new().set("name", "Ada".to_string())).unwrap(), "hello, Ada");
/// ```
pub struct Injected<R> {
    container: Container,
    name: &'static str,
    params: Arc<[Param]>,
    call: SyncCall<R>,
}

impl<R> Injected<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Calls with every injectable parameter resolved from the container.
    pub fn call(&self) -> DiResult<R> {
        self.call_with(Overrides::new())
    }

    /// Calls with `overrides` supplied verbatim and the rest resolved.
    pub fn call_with(&self, overrides: Overrides) -> DiResult<R> {
        let res = Resolution::root(self.container.clone(), ScopeStore::current());
        let args = resolve_arguments(&res, &self.params, self.name, overrides)?;
        (self.call)(args)
    }
}

impl<R> Clone for Injected<R> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            name: self.name,
            params: self.params.clone(),
            call: self.call.clone(),
        }
    }
}

/// Asynchronous counterpart of [`Injected`]; parameters are resolved on the
/// asynchronous path, so asynchronous providers are awaited.
pub struct AsyncInjected<R> {
    container: Container,
    name: &'static str,
    params: Arc<[Param]>,
    call: AsyncCall<R>,
}

impl<R: Send + 'static> AsyncInjected<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub async fn call(&self) -> DiResult<R> {
        self.call_with(Overrides::new()).await
    }

    pub async fn call_with(&self, overrides: Overrides) -> DiResult<R> {
        let res = Resolution::root(self.container.clone(), ScopeStore::current());
        let args = resolve_arguments_async(&res, &self.params, self.name, overrides).await?;
        (self.call)(args).await
    }
}

impl<R> Clone for AsyncInjected<R> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            name: self.name,
            params: self.params.clone(),
            call: self.call.clone(),
        }
    }
}

impl Container {
    /// Wraps `f` so that its declared parameters are supplied by this container.
    pub fn inject<R, F>(&self, name: &'static str, params: Vec<Param>, f: F) -> DiResult<Injected<R>>
    where
        R: 'static,
        F: Fn(&Arguments) -> DiResult<R> + Send + Sync + 'static,
    {
        validate_params(name, &params)?;
        let call: SyncCall<R> = Arc::new(move |args: Arguments| -> DiResult<R> { f(&args) });
        Ok(Injected {
            container: self.clone(),
            name,
            params: Arc::from(params),
            call,
        })
    }

    /// Wraps an asynchronous `f`; see [`inject`](Self::inject).
    pub fn inject_async<R, F, Fut>(&self, name: &'static str, params: Vec<Param>, f: F) -> DiResult<AsyncInjected<R>>
    where
        R: Send + 'static,
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<R>> + Send + 'static,
    {
        validate_params(name, &params)?;
        let call: AsyncCall<R> = Arc::new(move |args: Arguments| -> BoxFuture<DiResult<R>> { Box::pin(f(args)) });
        Ok(AsyncInjected {
            container: self.clone(),
            name,
            params: Arc::from(params),
            call,
        })
    }
}
