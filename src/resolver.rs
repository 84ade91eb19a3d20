//! Parameter binding and the per-resolution context.
//!
//! A [`Resolution`] is created for every top-level `get`/`get_async` and
//! threaded through each nested resolution. It carries the container, the
//! request scope captured when the resolution started, and the path used for
//! cycle detection.

use std::sync::Arc;
use std::time::Instant;

use crate::container::Container;
use crate::dependency::{Arguments, Overrides, Param, ParamKind};
use crate::error::{DiError, DiResult};
use crate::internal::ResolutionPath;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Binding, Strategy};
use crate::scope::{BoxFuture, ScopeState, ScopeStore};

#[derive(Clone)]
pub(crate) struct Resolution {
    container: Container,
    scope: Option<ScopeStore>,
    path: ResolutionPath,
}

impl Resolution {
    pub(crate) fn root(container: Container, scope: Option<ScopeStore>) -> Self {
        Self {
            container,
            scope,
            path: ResolutionPath::default(),
        }
    }

    pub(crate) fn scope(&self) -> Option<&ScopeStore> {
        self.scope.as_ref()
    }

    /// Store that caches request instances for `key`.
    pub(crate) fn request_store(&self, key: &Key) -> DiResult<&ScopeStore> {
        match &self.scope {
            None => Err(DiError::NoActiveScope(key.display_name())),
            Some(store) if store.state() == ScopeState::Exited => Err(DiError::ScopeExited(key.display_name())),
            Some(store) => Ok(store),
        }
    }

    fn lookup(&self, key: &Key) -> DiResult<Arc<Binding>> {
        self.container.binding(key).ok_or(DiError::MissingBinding {
            token: key.display_name(),
            parameter: None,
            owner: None,
        })
    }

    fn descend(&self, binding: &Binding) -> DiResult<Resolution> {
        let config = self.container.config();
        // Cached lifetimes wait on their own cell when re-entered.
        let detect = config.detect_cycles || binding.lifetime != Lifetime::Transient;
        let path = self.path.push(binding.primary, detect, config.max_depth)?;
        Ok(Resolution {
            container: self.container.clone(),
            scope: self.scope.clone(),
            path,
        })
    }

    /// Resolves `key` without suspending. Asynchronous bindings are an `AsyncLeak`.
    pub(crate) fn resolve_sync(&self, key: &Key) -> DiResult<AnyArc> {
        let binding = self.lookup(key)?;
        let observers = self.container.observers();
        let started = observers.has_observers().then(|| {
            observers.resolving(key);
            Instant::now()
        });

        let result = self.descend(&binding).and_then(|child| match &binding.strategy {
            Strategy::Sync(strategy) => strategy(&child),
            Strategy::Async(_) => Err(DiError::AsyncLeak {
                token: key.display_name(),
                parameter: None,
                owner: None,
            }),
        });

        if let Some(started) = started {
            match &result {
                Ok(_) => observers.resolved(key, started.elapsed()),
                Err(err) => observers.resolution_failed(key, err),
            }
        }
        result
    }

    /// Resolves `key`, awaiting asynchronous bindings and their dependencies.
    pub(crate) fn resolve_async(&self, key: Key) -> BoxFuture<DiResult<AnyArc>> {
        let this = self.clone();
        Box::pin(async move {
            let binding = this.lookup(&key)?;
            let observers = this.container.observers().clone();
            let started = observers.has_observers().then(|| {
                observers.resolving(&key);
                Instant::now()
            });

            let result = match this.descend(&binding) {
                Ok(child) => match &binding.strategy {
                    Strategy::Sync(strategy) => strategy(&child),
                    Strategy::Async(strategy) => strategy(child).await,
                },
                Err(err) => Err(err),
            };

            if let Some(started) = started {
                match &result {
                    Ok(_) => observers.resolved(&key, started.elapsed()),
                    Err(err) => observers.resolution_failed(&key, err),
                }
            }
            result
        })
    }

    /// Token that supplies `param`, `None` when its literal default applies.
    fn supplier(&self, param: &Param, owner: &'static str) -> DiResult<Option<Key>> {
        match self.container.supplier(param) {
            Some(key) => Ok(Some(key)),
            None if param.has_default() => Ok(None),
            None => Err(DiError::MissingBinding {
                token: param.type_label(),
                parameter: Some(param.name()),
                owner: Some(owner),
            }),
        }
    }
}

/// Binds every non-variadic parameter of `owner` on the synchronous path.
///
/// Explicit `overrides` win over resolution and are passed through even
/// when no parameter declares them.
pub(crate) fn resolve_arguments(
    res: &Resolution,
    params: &[Param],
    owner: &'static str,
    mut overrides: Overrides,
) -> DiResult<Arguments> {
    let mut args = Arguments::new(owner, res.scope().cloned());
    for param in params {
        if param.kind() == ParamKind::Rest {
            continue;
        }
        if let Some(value) = overrides.take(param.name()) {
            args.insert(param.name(), value);
            continue;
        }
        let Some(key) = res.supplier(param, owner)? else {
            continue;
        };
        let value = res
            .resolve_sync(&key)
            .map_err(|err| err.in_parameter(param.name(), owner))?;
        args.insert(param.name(), value);
    }
    for (name, value) in overrides.into_values() {
        args.insert(name, value);
    }
    Ok(args)
}

/// Asynchronous counterpart of [`resolve_arguments`]; dependencies are
/// resolved one after another in declaration order.
pub(crate) async fn resolve_arguments_async(
    res: &Resolution,
    params: &[Param],
    owner: &'static str,
    mut overrides: Overrides,
) -> DiResult<Arguments> {
    let mut args = Arguments::new(owner, res.scope().cloned());
    for param in params {
        if param.kind() == ParamKind::Rest {
            continue;
        }
        if let Some(value) = overrides.take(param.name()) {
            args.insert(param.name(), value);
            continue;
        }
        let Some(key) = res.supplier(param, owner)? else {
            continue;
        };
        let value = res
            .resolve_async(key)
            .await
            .map_err(|err| err.in_parameter(param.name(), owner))?;
        args.insert(param.name(), value);
    }
    for (name, value) in overrides.into_values() {
        args.insert(name, value);
    }
    Ok(args)
}
