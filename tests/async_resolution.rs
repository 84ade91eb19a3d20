use depin::{Container, DiError, Lifetime, Param, Source, Token};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Settings {
    region: String,
}

struct Uploader {
    settings: Arc<Settings>,
}

fn async_settings(container: &Container) -> Token<Settings> {
    container
        .bind(
            Lifetime::Singleton,
            Source::async_factory("load_settings", vec![], |_| async {
                tokio::task::yield_now().await;
                Ok(Settings { region: "eu-west-1".to_string() })
            }),
        )
        .unwrap()
}

#[tokio::test]
async fn test_sync_path_rejects_async_dependency() {
    let container = Container::new();
    let settings = async_settings(&container);
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Uploader>(vec![Param::inject("settings", &settings)], |args| {
                Ok(Uploader { settings: args.get("settings")? })
            }),
        )
        .unwrap();

    assert_eq!(container.is_async(Token::<Uploader>::of().key()), Some(true));

    match container.get(&Token::<Uploader>::of()) {
        Err(DiError::AsyncLeak { token, .. }) => assert!(token.contains("Uploader")),
        other => panic!("expected AsyncLeak, got {:?}", other.map(|_| ())),
    }

    let uploader = container.get_async(&Token::<Uploader>::of()).await.unwrap();
    let direct = container.get_async(&settings).await.unwrap();
    assert_eq!(*uploader.settings, *direct);
    assert!(Arc::ptr_eq(&uploader.settings, &direct));
}

#[tokio::test]
async fn test_async_leak_names_the_parameter() {
    struct Report;

    let container = Container::new();
    // Bound first as sync, then its dependency becomes async.
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Report>(vec![Param::typed::<Settings>("settings")], |_| Ok(Report)),
        )
        .unwrap();
    container
        .bind_with(
            Lifetime::Singleton,
            Source::async_factory("settings_by_type", vec![], |_| async {
                Ok(Settings { region: "us-east-1".to_string() })
            }),
            depin::BindOptions::new().abstract_as(&Token::<Settings>::of()),
        )
        .unwrap();

    assert_eq!(container.is_async(Token::<Report>::of().key()), Some(false));
    let err = container.get(&Token::<Report>::of()).err().unwrap();
    match &err {
        DiError::AsyncLeak { parameter, owner, .. } => {
            assert_eq!(*parameter, Some("settings"));
            assert!(owner.unwrap().contains("Report"));
        }
        other => panic!("expected AsyncLeak, got {:?}", other),
    }
    assert!(err.to_string().contains("get_async"));

    let stale = container.stale_classifications();
    assert_eq!(stale.len(), 1);
    assert!(stale[0].answers_to(Token::<Report>::of().key()));

    // Classification is fixed at bind time, so the async path fails the same way.
    assert!(matches!(
        container.get_async(&Token::<Report>::of()).await,
        Err(DiError::AsyncLeak { parameter: Some("settings"), .. })
    ));
}

#[tokio::test]
async fn test_sync_bindings_resolve_on_async_path() {
    struct Plain(u8);

    let container = Container::new();
    container
        .bind(Lifetime::Singleton, Source::class::<Plain>(vec![], |_| Ok(Plain(3))))
        .unwrap();

    assert_eq!(container.is_async(Token::<Plain>::of().key()), Some(false));
    assert_eq!(container.get_async(&Token::<Plain>::of()).await.unwrap().0, 3);
    assert_eq!(container.get_type_async::<Plain>().await.unwrap().0, 3);
}

#[tokio::test]
async fn test_async_classification_is_transitive() {
    struct Mid {
        settings: Arc<Settings>,
    }
    struct Top {
        mid: Arc<Mid>,
    }

    let container = Container::new();
    let settings = async_settings(&container);
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Mid>(vec![Param::inject("settings", &settings)], |args| {
                Ok(Mid { settings: args.get("settings")? })
            }),
        )
        .unwrap();
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Top>(vec![Param::typed::<Mid>("mid")], |args| {
                Ok(Top { mid: args.get("mid")? })
            }),
        )
        .unwrap();

    assert_eq!(container.is_async(Token::<Top>::of().key()), Some(true));
    assert!(matches!(container.get_type::<Top>(), Err(DiError::AsyncLeak { .. })));
    let top = container.get_type_async::<Top>().await.unwrap();
    assert_eq!(top.mid.settings.region, "eu-west-1");
}

#[tokio::test]
async fn test_async_singleton_runs_once_under_contention() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let container = Container::new();
    let token = container
        .bind(
            Lifetime::Singleton,
            Source::async_factory("warm_cache", vec![], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    Ok(vec![1u32, 2, 3])
                }
            }),
        )
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let container = container.clone();
        handles.push(tokio::spawn(async move { container.get_async(&token).await.unwrap() }));
    }
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn test_async_transient_runs_every_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let container = Container::new();
    let token = container
        .bind(
            Lifetime::Transient,
            Source::async_factory("ticket", vec![], move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n) }
            }),
        )
        .unwrap();

    assert_eq!(*container.get_async(&token).await.unwrap(), 0);
    assert_eq!(*container.get_async(&token).await.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_async_provider_error_propagates() {
    let container = Container::new();
    let token = container
        .bind(
            Lifetime::Singleton,
            Source::async_factory("fetch_key", vec![], |_| async {
                Err::<String, _>(DiError::provider("fetch_key", "vault sealed"))
            }),
        )
        .unwrap();

    let err = container.get_async(&token).await.err().unwrap();
    assert!(matches!(err, DiError::Provider { token: "fetch_key", .. }));
    assert!(std::error::Error::source(&err).is_some());
}
