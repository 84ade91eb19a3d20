//! Provider sources accepted by [`Container::bind`](crate::Container::bind).
//!
//! A [`Source`] pairs a body with its declared [`Param`] list. Four shapes
//! exist: class-like constructors, plain callables (sync or async), and
//! resource pairs (sync or async) whose release step runs at scope exit.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::dependency::{Arguments, Param};
use crate::error::{BoxError, DiError, DiResult};
use crate::key::Key;
use crate::registration::AnyArc;
use crate::scope::{BoxFuture, Disposable};
use crate::traits::{AsyncDispose, Dispose};

/// Structural kind of a provider, fixed when the source is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum Shape {
    /// Class-like constructor registered under its type token.
    Class,
    /// Plain callable registered under its name.
    Callable,
    /// Synchronous acquire/release pair.
    Resource,
    /// Asynchronous acquire/release pair.
    AsyncResource,
}

impl Shape {
    /// Whether instances carry a release step. Only legal under `Lifetime::Request`.
    pub fn is_resource(&self) -> bool {
        matches!(self, Shape::Resource | Shape::AsyncResource)
    }
}

/// Instance plus its pending release step, if any.
pub(crate) type Produced = (AnyArc, Option<Disposable>);

pub(crate) type SyncBody = Arc<dyn Fn(Arguments) -> DiResult<Produced> + Send + Sync>;
pub(crate) type AsyncBody = Arc<dyn Fn(Arguments) -> BoxFuture<DiResult<Produced>> + Send + Sync>;

/// Type-erased provider body.
#[derive(Clone)]
pub(crate) enum Body {
    Sync(SyncBody),
    Async(AsyncBody),
}

impl Body {
    /// Rewrites every produced value with `f`. The release step, if any,
    /// still sees the value as first produced.
    pub(crate) fn map_value(self, f: impl Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync + 'static) -> Body {
        let f = Arc::new(f);
        match self {
            Body::Sync(body) => Body::Sync(Arc::new(move |args: Arguments| -> DiResult<Produced> {
                let (value, disposable) = body(args)?;
                Ok((f(value)?, disposable))
            })),
            Body::Async(body) => Body::Async(Arc::new(move |args: Arguments| -> BoxFuture<DiResult<Produced>> {
                let pending = body(args);
                let f = f.clone();
                Box::pin(async move {
                    let (value, disposable) = pending.await?;
                    Ok((f(value)?, disposable))
                })
            })),
        }
    }
}

type Ctor<T> = Arc<dyn Fn(&Arguments) -> DiResult<T> + Send + Sync>;
type SharedCtor<T> = Arc<dyn Fn(&Arguments) -> DiResult<Arc<T>> + Send + Sync>;
type AsyncCtor<T> = Arc<dyn Fn(Arguments) -> BoxFuture<DiResult<T>> + Send + Sync>;
type ReleaseFn<T> = Arc<dyn Fn(Arc<T>) -> Result<(), BoxError> + Send + Sync>;
type AsyncReleaseFn<T> = Arc<dyn Fn(Arc<T>) -> BoxFuture<Result<(), BoxError>> + Send + Sync>;

enum Provider<T> {
    Sync(SharedCtor<T>),
    Async(AsyncCtor<T>),
    Resource {
        acquire: Ctor<T>,
        release: ReleaseFn<T>,
    },
    AsyncResource {
        acquire: AsyncCtor<T>,
        release: AsyncReleaseFn<T>,
        blocking: Option<ReleaseFn<T>>,
    },
}

/// A provider for `T` together with its statically declared dependencies.
///
/// # Examples
///
/// ```rust
/// use depin::{Container, Lifetime, Param, Source, Token};
/// use std::sync::Arc;
///
/// struct Db { url: String }
/// struct Repo { db: Arc<Db> }
///
/// let container = Container::new();
/// container
///     .bind(Lifetime::Singleton, Source::class::<Db>(vec![], |_| Ok(Db { url: "sqlite::memory:".into() })))
///     .unwrap();
/// container
///     .bind(
///         Lifetime::Singleton,
///         Source::class::<Repo>(vec![Param::typed::<Db>("db")], |args| {
///             Ok(Repo { db: args.get::<Db>("db")? })
///         }),
///     )
///     .unwrap();
///
/// let repo = container.get(&Token::<Repo>::of()).unwrap();
/// assert_eq!(repo.db.url, "sqlite::memory:");
/// ```
pub struct Source<T> {
    key: Key,
    name: &'static str,
    shape: Shape,
    params: Vec<Param>,
    provider: Provider<T>,
    _marker: PhantomData<fn() -> T>,
}

// `class` names the produced type in its own turbofish, so it lives on a
// fixed instantiation the way `HashMap::new` does.
impl Source<()> {
    /// Class-like constructor, registered under `Token::<T>::of()`.
    pub fn class<T: Send + Sync + 'static>(
        params: Vec<Param>,
        ctor: impl Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    ) -> Source<T> {
        let key = Key::of::<T>();
        let ctor = move |args: &Arguments| ctor(args).map(Arc::new);
        Source::build(key, key.type_name(), Shape::Class, params, Provider::Sync(Arc::new(ctor)))
    }
}

impl<T: Send + Sync + 'static> Source<T> {
    fn build(key: Key, name: &'static str, shape: Shape, params: Vec<Param>, provider: Provider<T>) -> Self {
        Self {
            key,
            name,
            shape,
            params,
            provider,
            _marker: PhantomData,
        }
    }

    /// Plain callable, registered under `Token::<T>::named(name)`.
    pub fn factory<F>(name: &'static str, params: Vec<Param>, f: F) -> Self
    where
        F: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        let f = move |args: &Arguments| f(args).map(Arc::new);
        Self::build(Key::named::<T>(name), name, Shape::Callable, params, Provider::Sync(Arc::new(f)))
    }

    /// Callable under an arbitrary key whose body hands out an already shared value.
    pub(crate) fn shared<F>(key: Key, params: Vec<Param>, f: F) -> Self
    where
        F: Fn(&Arguments) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::build(key, key.display_name(), Shape::Callable, params, Provider::Sync(Arc::new(f)))
    }

    /// Asynchronous callable. Always resolves through the asynchronous path.
    pub fn async_factory<F, Fut>(name: &'static str, params: Vec<Param>, f: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        let ctor: AsyncCtor<T> = Arc::new(move |args: Arguments| -> BoxFuture<DiResult<T>> { Box::pin(f(args)) });
        Self::build(Key::named::<T>(name), name, Shape::Callable, params, Provider::Async(ctor))
    }

    /// Synchronous resource: `acquire` builds the instance on first use in a
    /// scope, `release` receives it back when the scope exits.
    pub fn resource<A, R>(name: &'static str, params: Vec<Param>, acquire: A, release: R) -> Self
    where
        A: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
        R: Fn(Arc<T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::build(
            Key::named::<T>(name),
            name,
            Shape::Resource,
            params,
            Provider::Resource {
                acquire: Arc::new(acquire),
                release: Arc::new(release),
            },
        )
    }

    /// Asynchronous resource. Released by `exit_scope_async`; a synchronous
    /// exit needs [`with_blocking_release`](Self::with_blocking_release).
    pub fn async_resource<A, AFut, R, RFut>(name: &'static str, params: Vec<Param>, acquire: A, release: R) -> Self
    where
        A: Fn(Arguments) -> AFut + Send + Sync + 'static,
        AFut: Future<Output = DiResult<T>> + Send + 'static,
        R: Fn(Arc<T>) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let acquire: AsyncCtor<T> =
            Arc::new(move |args: Arguments| -> BoxFuture<DiResult<T>> { Box::pin(acquire(args)) });
        let release: AsyncReleaseFn<T> =
            Arc::new(move |value: Arc<T>| -> BoxFuture<Result<(), BoxError>> { Box::pin(release(value)) });
        Self::build(
            Key::named::<T>(name),
            name,
            Shape::AsyncResource,
            params,
            Provider::AsyncResource {
                acquire,
                release,
                blocking: None,
            },
        )
    }

    /// Synchronous fallback used when an asynchronous resource is torn down by
    /// a synchronous exit. Has no effect on other shapes.
    pub fn with_blocking_release<R>(mut self, release: R) -> Self
    where
        R: Fn(Arc<T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        if let Provider::AsyncResource { blocking, .. } = &mut self.provider {
            *blocking = Some(Arc::new(release));
        }
        self
    }

    /// Resource whose release is the value's [`Dispose`] implementation.
    pub fn disposable<A>(name: &'static str, params: Vec<Param>, acquire: A) -> Self
    where
        T: Dispose,
        A: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        Self::resource(name, params, acquire, |value: Arc<T>| {
            Dispose::dispose(&*value);
            Ok(())
        })
    }

    /// Resource whose release is the value's [`AsyncDispose`] implementation.
    pub fn async_disposable<A, AFut>(name: &'static str, params: Vec<Param>, acquire: A) -> Self
    where
        T: AsyncDispose,
        A: Fn(Arguments) -> AFut + Send + Sync + 'static,
        AFut: Future<Output = DiResult<T>> + Send + 'static,
    {
        Self::async_resource(name, params, acquire, |value: Arc<T>| async move {
            AsyncDispose::dispose(&*value).await;
            Ok(())
        })
    }

    /// Key the source registers under when no abstract token is given.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Implementation name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether the body itself is asynchronous.
    pub fn is_async(&self) -> bool {
        matches!(self.provider, Provider::Async(_) | Provider::AsyncResource { .. })
    }

    /// Erases the value type, folding the release step into the produced instance.
    pub(crate) fn lower(self) -> (Vec<Param>, Body) {
        let token = self.name;
        let body = match self.provider {
            Provider::Sync(ctor) => {
                let body: SyncBody = Arc::new(move |args: Arguments| -> DiResult<Produced> {
                    let value: AnyArc = ctor(&args)?;
                    Ok((value, None))
                });
                Body::Sync(body)
            }
            Provider::Async(ctor) => {
                let body: AsyncBody = Arc::new(move |args: Arguments| -> BoxFuture<DiResult<Produced>> {
                    let pending = ctor(args);
                    Box::pin(async move {
                        let value: AnyArc = Arc::new(pending.await?);
                        Ok((value, None))
                    })
                });
                Body::Async(body)
            }
            Provider::Resource { acquire, release } => {
                let body: SyncBody = Arc::new(move |args: Arguments| -> DiResult<Produced> {
                    let value = Arc::new(acquire(&args)?);
                    let release = release.clone();
                    let held = value.clone();
                    let disposable = Disposable::sync(token, Box::new(move || release(held)));
                    Ok((value as AnyArc, Some(disposable)))
                });
                Body::Sync(body)
            }
            Provider::AsyncResource {
                acquire,
                release,
                blocking,
            } => {
                let body: AsyncBody = Arc::new(move |args: Arguments| -> BoxFuture<DiResult<Produced>> {
                    let pending = acquire(args);
                    let release = release.clone();
                    let blocking = blocking.clone();
                    Box::pin(async move {
                        let value = Arc::new(pending.await?);
                        let held = value.clone();
                        let release_async: Box<dyn FnOnce() -> BoxFuture<Result<(), BoxError>> + Send> =
                            Box::new(move || release(held));
                        let release_blocking = blocking.map(|blocking| {
                            let held = value.clone();
                            let f: Box<dyn FnOnce() -> Result<(), BoxError> + Send> =
                                Box::new(move || blocking(held));
                            f
                        });
                        let disposable = Disposable::asynchronous(token, release_async, release_blocking);
                        Ok((value as AnyArc, Some(disposable)))
                    })
                });
                Body::Async(body)
            }
        };
        (self.params, body)
    }
}

impl<T> std::fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("key", &self.key)
            .field("shape", &self.shape)
            .field("params", &self.params)
            .finish()
    }
}

/// Rejects malformed sources before anything is stored.
pub(crate) fn validate_params(owner: &'static str, params: &[Param]) -> DiResult<()> {
    if owner.is_empty() {
        return Err(DiError::InvalidRegistration("provider name must not be empty".to_string()));
    }
    let mut seen = std::collections::HashSet::new();
    for param in params {
        if param.name().is_empty() {
            return Err(DiError::InvalidRegistration(format!(
                "{} declares a parameter with an empty name",
                owner
            )));
        }
        if !seen.insert(param.name()) {
            return Err(DiError::InvalidRegistration(format!(
                "{} declares parameter '{}' more than once",
                owner,
                param.name()
            )));
        }
    }
    Ok(())
}
