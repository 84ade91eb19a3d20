use depin::{Container, ContainerConfig, DiError, Lifetime, Param, Source, Token};

struct A;
struct B;
struct C;

fn bind_cycle(container: &Container, lifetime: Lifetime) {
    container
        .bind(lifetime, Source::class::<A>(vec![Param::typed::<B>("b")], |_| Ok(A)))
        .unwrap();
    container
        .bind(lifetime, Source::class::<B>(vec![Param::typed::<C>("c")], |_| Ok(B)))
        .unwrap();
    container
        .bind(lifetime, Source::class::<C>(vec![Param::typed::<A>("a")], |_| Ok(C)))
        .unwrap();
}

fn short(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

#[test]
fn test_self_circular_dependency() {
    struct Selfish;

    let container = Container::new();
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Selfish>(vec![Param::typed::<Selfish>("me")], |_| Ok(Selfish)),
        )
        .unwrap();

    match container.get_type::<Selfish>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 2);
            assert!(path.iter().all(|name| name.contains("Selfish")));
        }
        other => panic!("expected Circular, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_three_way_cycle_reports_full_path() {
    let container = Container::new();
    bind_cycle(&container, Lifetime::Transient);

    match container.get_type::<A>() {
        Err(DiError::Circular(path)) => {
            let names: Vec<_> = path.iter().map(|name| short(name)).collect();
            assert_eq!(names, vec!["A", "B", "C", "A"]);
        }
        other => panic!("expected Circular, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_singleton_cycle_detected_without_deadlock() {
    let container = Container::with_config(ContainerConfig::default().detect_cycles(false));
    bind_cycle(&container, Lifetime::Singleton);

    assert!(matches!(container.get_type::<B>(), Err(DiError::Circular(_))));
}

#[tokio::test]
async fn test_cycle_detected_on_async_path() {
    let container = Container::new();
    bind_cycle(&container, Lifetime::Transient);

    match container.get_type_async::<C>().await {
        Err(DiError::Circular(path)) => {
            let names: Vec<_> = path.iter().map(|name| short(name)).collect();
            assert_eq!(names, vec!["C", "A", "B", "C"]);
        }
        other => panic!("expected Circular, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_disabled_detection_falls_back_to_depth_guard() {
    let container = Container::with_config(ContainerConfig::default().detect_cycles(false).max_depth(32));
    bind_cycle(&container, Lifetime::Transient);

    assert!(matches!(container.get_type::<A>(), Err(DiError::DepthExceeded(32))));
}

#[tokio::test]
async fn test_request_self_dependency_rejected_with_detection_disabled() {
    let container = Container::with_config(ContainerConfig::default().detect_cycles(false).max_depth(16));
    let looping = Token::<u32>::named("loop");
    container
        .bind(
            Lifetime::Request,
            Source::async_factory("loop", vec![Param::inject("again", &looping)], |_| async { Ok(1u32) }),
        )
        .unwrap();

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        container.scoped_async(|_| async { container.get_async(&looping).await }),
    )
    .await
    .expect("request re-entry must fail instead of waiting on its own slot");

    match outcome {
        Err(DiError::Circular(path)) => assert_eq!(path, vec!["loop", "loop"]),
        other => panic!("expected Circular, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_depth_limit_applies_to_deep_chains() {
    struct L0;
    struct L1;
    struct L2;
    struct L3;

    let container = Container::with_config(ContainerConfig::default().max_depth(3));
    container.bind(Lifetime::Transient, Source::class::<L3>(vec![], |_| Ok(L3))).unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<L2>(vec![Param::typed::<L3>("next")], |_| Ok(L2)))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<L1>(vec![Param::typed::<L2>("next")], |_| Ok(L1)))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<L0>(vec![Param::typed::<L1>("next")], |_| Ok(L0)))
        .unwrap();

    assert!(container.get_type::<L1>().is_ok());
    assert!(matches!(container.get_type::<L0>(), Err(DiError::DepthExceeded(3))));
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Shared;
    struct Left;
    struct Right;
    struct Top;

    let container = Container::new();
    container
        .bind(Lifetime::Transient, Source::class::<Shared>(vec![], |_| Ok(Shared)))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Left>(vec![Param::typed::<Shared>("s")], |_| Ok(Left)))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Right>(vec![Param::typed::<Shared>("s")], |_| Ok(Right)))
        .unwrap();
    container
        .bind(
            Lifetime::Transient,
            Source::class::<Top>(vec![Param::typed::<Left>("l"), Param::typed::<Right>("r")], |_| Ok(Top)),
        )
        .unwrap();

    assert!(container.get(&Token::<Top>::of()).is_ok());
}
