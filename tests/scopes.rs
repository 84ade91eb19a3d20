use depin::{Container, DiError, Lifetime, Param, ScopeState, ScopeStore, Source, Token};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Counter {
    hits: Mutex<u32>,
}

fn counter_container() -> Container {
    let container = Container::new();
    container
        .bind(
            Lifetime::Request,
            Source::class::<Counter>(vec![], |_| Ok(Counter { hits: Mutex::new(0) })),
        )
        .unwrap();
    container
}

#[test]
fn test_request_instances_are_isolated_per_scope() {
    let container = counter_container();

    let scope_a = container.enter_scope();
    let a1 = container.get_type::<Counter>().unwrap();
    let a2 = container.get_type::<Counter>().unwrap();
    assert!(Arc::ptr_eq(&a1, &a2));
    *a1.hits.lock().unwrap() += 5;
    container.exit_scope(scope_a);

    let scope_b = container.enter_scope();
    let b = container.get_type::<Counter>().unwrap();
    assert!(!Arc::ptr_eq(&a1, &b));
    assert_eq!(*b.hits.lock().unwrap(), 0);
    container.exit_scope(scope_b);
}

#[test]
fn test_nested_scopes_restore_outer() {
    let container = counter_container();

    let outer = container.enter_scope();
    let outer_id = outer.store().id();
    let from_outer = container.get_type::<Counter>().unwrap();

    let inner = container.enter_scope();
    assert_ne!(ScopeStore::current().unwrap().id(), outer_id);
    let from_inner = container.get_type::<Counter>().unwrap();
    assert!(!Arc::ptr_eq(&from_outer, &from_inner));
    container.exit_scope(inner);

    // Back in the outer scope, its cached instance is still there.
    assert_eq!(ScopeStore::current().unwrap().id(), outer_id);
    let again = container.get_type::<Counter>().unwrap();
    assert!(Arc::ptr_eq(&from_outer, &again));
    container.exit_scope(outer);

    assert!(ScopeStore::current().is_none());
}

#[test]
fn test_request_without_scope_fails() {
    let container = counter_container();

    match container.get_type::<Counter>() {
        Err(DiError::NoActiveScope(name)) => assert!(name.contains("Counter")),
        other => panic!("expected NoActiveScope, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_exited_store_rejects_resolution() {
    let container = counter_container();

    let token = container.enter_scope();
    let store = token.store().clone();
    container.get_type::<Counter>().unwrap();
    assert!(store.is_cached(Token::<Counter>::of().key()));
    container.exit_scope(token);

    assert_eq!(store.state(), ScopeState::Exited);
    assert!(!store.is_cached(Token::<Counter>::of().key()));
    assert!(matches!(
        container.within(&store).get(&Token::<Counter>::of()),
        Err(DiError::ScopeExited(_))
    ));
}

#[test]
fn test_within_ignores_ambient_scope() {
    let container = counter_container();

    let detached = container.enter_scope();
    let detached_store = detached.store().clone();
    let from_detached = container.get_type::<Counter>().unwrap();

    let ambient = container.enter_scope();
    let from_ambient = container.get_type::<Counter>().unwrap();
    let explicit = container.within(&detached_store).get(&Token::<Counter>::of()).unwrap();

    assert!(Arc::ptr_eq(&explicit, &from_detached));
    assert!(!Arc::ptr_eq(&explicit, &from_ambient));

    container.exit_scope(ambient);
    container.exit_scope(detached);
}

#[test]
fn test_scoped_returns_body_output() {
    let container = counter_container();

    let hits = container.scoped(|store| {
        assert_eq!(store.state(), ScopeState::Entered);
        let counter = container.get_type::<Counter>().unwrap();
        *counter.hits.lock().unwrap() += 1;
        let same = container.get_type::<Counter>().unwrap();
        let hits = *same.hits.lock().unwrap();
        hits
    });

    assert_eq!(hits, 1);
    assert!(ScopeStore::current().is_none());
}

#[test]
fn test_scope_exits_on_panic() {
    let container = counter_container();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        container.scoped(|_| {
            container.get_type::<Counter>().unwrap();
            panic!("handler failed");
        })
    }));

    assert!(result.is_err());
    assert!(ScopeStore::current().is_none());
}

#[test]
fn test_request_dependency_shared_within_scope() {
    struct Session;
    struct Audit {
        session: Arc<Session>,
    }
    struct Billing {
        session: Arc<Session>,
    }

    let container = Container::new();
    container
        .bind(Lifetime::Request, Source::class::<Session>(vec![], |_| Ok(Session)))
        .unwrap();
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Audit>(vec![Param::typed::<Session>("session")], |args| {
                Ok(Audit { session: args.get("session")? })
            }),
        )
        .unwrap();
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Billing>(vec![Param::typed::<Session>("session")], |args| {
                Ok(Billing { session: args.get("session")? })
            }),
        )
        .unwrap();

    container.scoped(|_| {
        let audit = container.get_type::<Audit>().unwrap();
        let billing = container.get_type::<Billing>().unwrap();
        assert!(Arc::ptr_eq(&audit.session, &billing.session));
    });
}

#[tokio::test]
async fn test_async_request_cached_across_awaits() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let container = Container::new();
    container
        .bind(
            Lifetime::Request,
            Source::async_factory("trace_id", vec![], move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::task::yield_now().await;
                    Ok(n as u64)
                }
            }),
        )
        .unwrap();

    let token = Token::<u64>::named("trace_id");
    let (first, second) = container
        .scoped_async(|_| async {
            let first = container.get_async(&token).await.unwrap();
            tokio::task::yield_now().await;
            let second = container.get_async(&token).await.unwrap();
            (first, second)
        })
        .await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_tasks_observe_disjoint_scopes() {
    let container = Container::new();
    container
        .bind(
            Lifetime::Request,
            Source::factory("request_slot", vec![], |_| Ok(Mutex::new(Vec::<usize>::new()))),
        )
        .unwrap();
    let token = Token::<Mutex<Vec<usize>>>::named("request_slot");

    let mut handles = Vec::new();
    for task in 0..16usize {
        let container = container.clone();
        handles.push(tokio::spawn(async move {
            let resolver = container.clone();
            container
                .scoped_async(|store| async move {
                    let scope_id = store.id();
                    for step in 0..3 {
                        let slot = resolver.get_async(&token).await.unwrap();
                        slot.lock().unwrap().push(task * 10 + step);
                        tokio::task::yield_now().await;
                        assert_eq!(ScopeStore::current().unwrap().id(), scope_id);
                    }
                    let slot = resolver.get(&token).unwrap();
                    let seen = slot.lock().unwrap().clone();
                    seen
                })
                .await
        }));
    }

    for (task, handle) in handles.into_iter().enumerate() {
        let seen = handle.await.unwrap();
        assert_eq!(seen, vec![task * 10, task * 10 + 1, task * 10 + 2]);
    }
}

#[tokio::test]
async fn test_interleaved_scopes_on_one_thread() {
    let container = counter_container();

    let left = depin::with_task_scope(async {
        let token = container.enter_scope();
        let counter = container.get_type::<Counter>().unwrap();
        tokio::task::yield_now().await;
        let again = container.get_type::<Counter>().unwrap();
        container.exit_scope_async(token).await;
        Arc::ptr_eq(&counter, &again)
    });
    let right = depin::with_task_scope(async {
        let token = container.enter_scope();
        let counter = container.get_type::<Counter>().unwrap();
        tokio::task::yield_now().await;
        let again = container.get_type::<Counter>().unwrap();
        container.exit_scope_async(token).await;
        Arc::ptr_eq(&counter, &again)
    });

    let (left, right) = tokio::join!(left, right);
    assert!(left && right);
    assert!(ScopeStore::current().is_none());
}

#[tokio::test]
async fn test_spawned_tasks_keep_their_own_raw_scopes() {
    let container = counter_container();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let container = container.clone();
        handles.push(tokio::spawn(async move {
            depin::with_task_scope(async {
                let token = container.enter_scope();
                let scope_id = token.store().id();
                let counter = container.get_type::<Counter>().unwrap();
                tokio::task::yield_now().await;
                assert_eq!(ScopeStore::current().map(|s| s.id()), Some(scope_id));
                let again = container.get_type::<Counter>().unwrap();
                container.exit_scope_async(token).await;
                (scope_id, Arc::ptr_eq(&counter, &again))
            })
            .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let (id, same_instance) = handle.await.unwrap();
        assert!(same_instance);
        ids.push(id);
    }
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_raw_scope_on_runtime_thread_needs_task_slot() {
    let container = counter_container();

    assert!(matches!(container.try_enter_scope(), Err(DiError::TaskScopeRequired)));
    assert!(ScopeStore::current().is_none());

    // A body that cannot yield may still use the thread slot.
    let hits = container.scoped(|_| {
        let counter = container.get_type::<Counter>().unwrap();
        *counter.hits.lock().unwrap() += 1;
        let hits = *counter.hits.lock().unwrap();
        hits
    });
    assert_eq!(hits, 1);
}

#[tokio::test]
#[should_panic(expected = "with_task_scope")]
async fn test_enter_scope_panics_on_runtime_thread() {
    let container = counter_container();
    let _token = container.enter_scope();
}
