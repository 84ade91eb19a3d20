//! Strategy materialization.
//!
//! Each `bind` folds its {lifetime × sync/async} combination into exactly one
//! closure. Resolution then only invokes that closure; no shape or lifetime
//! checks run on the hot path.

use std::sync::Arc;

use crate::dependency::{Overrides, Param};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, AsyncStrategy, Strategy, SyncStrategy};
use crate::resolver::{resolve_arguments, resolve_arguments_async, Resolution};
use crate::scope::BoxFuture;
use crate::source::{Body, Produced};

type SyncProduce = Arc<dyn Fn(&Resolution) -> DiResult<Produced> + Send + Sync>;
type AsyncProduce = Arc<dyn Fn(Resolution) -> BoxFuture<DiResult<Produced>> + Send + Sync>;

/// Builds the strategy for one binding.
///
/// `key` is the binding's primary token and doubles as the request-cache key,
/// so every alias shares one cached instance. A synchronous body with an
/// asynchronous dependency is lifted onto the asynchronous path.
pub(crate) fn materialize(
    lifetime: Lifetime,
    key: Key,
    owner: &'static str,
    params: Arc<[Param]>,
    body: Body,
    is_async: bool,
) -> Strategy {
    match (body, is_async) {
        (Body::Sync(body), false) => {
            let produce: SyncProduce = Arc::new(move |res: &Resolution| -> DiResult<Produced> {
                let args = resolve_arguments(res, &params, owner, Overrides::default())?;
                body(args)
            });
            Strategy::Sync(cache_sync(lifetime, key, produce))
        }
        (Body::Sync(body), true) => {
            let produce: AsyncProduce = Arc::new(move |res: Resolution| -> BoxFuture<DiResult<Produced>> {
                let params = params.clone();
                let body = body.clone();
                Box::pin(async move {
                    let args = resolve_arguments_async(&res, &params, owner, Overrides::default()).await?;
                    body(args)
                })
            });
            Strategy::Async(cache_async(lifetime, key, produce))
        }
        (Body::Async(body), _) => {
            let produce: AsyncProduce = Arc::new(move |res: Resolution| -> BoxFuture<DiResult<Produced>> {
                let params = params.clone();
                let body = body.clone();
                Box::pin(async move {
                    let args = resolve_arguments_async(&res, &params, owner, Overrides::default()).await?;
                    body(args).await
                })
            });
            Strategy::Async(cache_async(lifetime, key, produce))
        }
    }
}

fn cache_sync(lifetime: Lifetime, key: Key, produce: SyncProduce) -> SyncStrategy {
    match lifetime {
        Lifetime::Singleton => {
            let cell: Arc<once_cell::sync::OnceCell<AnyArc>> = Arc::new(once_cell::sync::OnceCell::new());
            Arc::new(move |res: &Resolution| -> DiResult<AnyArc> {
                cell.get_or_try_init(|| produce(res).map(|(value, _)| value))
                    .cloned()
            })
        }
        Lifetime::Transient => Arc::new(move |res: &Resolution| -> DiResult<AnyArc> {
            produce(res).map(|(value, _)| value)
        }),
        Lifetime::Request => Arc::new(move |res: &Resolution| -> DiResult<AnyArc> {
            let store = res.request_store(&key)?;
            let slot = store.slot(&key)?;
            if let Some(value) = slot.get() {
                return Ok(value.clone());
            }
            let (value, disposable) = produce(res)?;
            if let Some(disposable) = disposable {
                store.push_disposable(disposable);
            }
            match slot.set(value.clone()) {
                Ok(()) => Ok(value),
                // An asynchronous resolution filled the slot first.
                Err(_) => Ok(slot.get().cloned().unwrap_or(value)),
            }
        }),
    }
}

fn cache_async(lifetime: Lifetime, key: Key, produce: AsyncProduce) -> AsyncStrategy {
    match lifetime {
        Lifetime::Singleton => {
            let cell: Arc<tokio::sync::OnceCell<AnyArc>> = Arc::new(tokio::sync::OnceCell::new());
            Arc::new(move |res: Resolution| -> BoxFuture<DiResult<AnyArc>> {
                let cell = cell.clone();
                let produce = produce.clone();
                Box::pin(async move {
                    cell.get_or_try_init(move || async move { produce(res).await.map(|(value, _)| value) })
                        .await
                        .cloned()
                })
            })
        }
        Lifetime::Transient => Arc::new(move |res: Resolution| -> BoxFuture<DiResult<AnyArc>> {
            let pending = produce(res);
            Box::pin(async move { pending.await.map(|(value, _)| value) })
        }),
        Lifetime::Request => Arc::new(move |res: Resolution| -> BoxFuture<DiResult<AnyArc>> {
            let produce = produce.clone();
            let key = key.clone();
            Box::pin(async move {
                let store = res.request_store(&key)?.clone();
                let slot = store.slot(&key)?;
                let mut acquired = None;
                let value = slot
                    .get_or_try_init(|| async {
                        let (value, disposable) = produce(res).await?;
                        acquired = disposable;
                        Ok::<AnyArc, DiError>(value)
                    })
                    .await?
                    .clone();
                if let Some(disposable) = acquired {
                    store.push_disposable(disposable);
                }
                Ok(value)
            })
        }),
    }
}
