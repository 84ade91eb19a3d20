use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depin::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let container = Container::new();
    let token = container
        .bind(Lifetime::Singleton, Source::factory("answer", vec![], |_| Ok(42u64)))
        .unwrap();

    // Prime the singleton
    let _ = container.get(&token).unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = container.get(&token).unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let container = Container::new();
                container
                    .bind(
                        Lifetime::Singleton,
                        Source::class::<ExpensiveToCreate>(vec![], |_| {
                            Ok(ExpensiveToCreate { data: (0..1000).collect() })
                        }),
                    )
                    .unwrap();
                container
            },
            |container| {
                let v = container.get_type::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_request_vs_transient(c: &mut Criterion) {
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("request_vs_transient");

    let request = Container::new();
    request
        .bind(Lifetime::Request, Source::class::<Service>(vec![], |_| Ok(Service { data: [0; 64] })))
        .unwrap();
    let scope = request.enter_scope();

    group.bench_function("request_hit", |b| {
        b.iter(|| {
            let v = request.get_type::<Service>().unwrap();
            black_box(&v.data);
        })
    });
    request.exit_scope(scope);

    let transient = Container::new();
    transient
        .bind(Lifetime::Transient, Source::class::<Service>(vec![], |_| Ok(Service { data: [0; 64] })))
        .unwrap();

    group.bench_function("transient", |b| {
        b.iter(|| {
            let v = transient.get_type::<Service>().unwrap();
            black_box(&v.data);
        })
    });

    group.finish();
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    struct ScopedService {
        data: Vec<u8>,
    }

    let mut group = c.benchmark_group("scope_lifecycle");

    let empty = Container::new();
    group.bench_function("empty_scope_enter_exit", |b| {
        b.iter(|| {
            let scope = empty.enter_scope();
            black_box(empty.exit_scope(scope));
        })
    });

    let with_service = Container::new();
    with_service
        .bind(
            Lifetime::Request,
            Source::class::<ScopedService>(vec![], |_| Ok(ScopedService { data: vec![0; 1024] })),
        )
        .unwrap();

    group.bench_function("scope_with_service", |b| {
        b.iter(|| {
            with_service.scoped(|_| {
                let service = with_service.get_type::<ScopedService>().unwrap();
                black_box(service.data.len());
            })
        })
    });

    group.finish();
}

fn bench_teardown(c: &mut Criterion) {
    let mut group = c.benchmark_group("teardown");

    struct DisposableService {
        data: Vec<u8>,
    }

    impl Dispose for DisposableService {
        fn dispose(&self) {
            black_box(&self.data);
        }
    }

    const NAMES: [&str; 10] = ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", "d8", "d9"];

    let container = Container::new();
    for name in NAMES {
        container
            .bind(
                Lifetime::Request,
                Source::disposable(name, vec![], |_| Ok(DisposableService { data: vec![0; 1024] })),
            )
            .unwrap();
    }

    group.bench_function("scope_with_10_disposables", |b| {
        b.iter(|| {
            let report = container.scoped(|_| {
                for name in NAMES {
                    let service = container.get(&Token::<DisposableService>::named(name)).unwrap();
                    black_box(service.data.len());
                }
            });
            black_box(report);
        })
    });

    group.finish();
}

fn bench_parameter_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("parameter_chain");

    // Non-circular chain of depth 8
    struct Service1;
    struct Service2 { _s1: Arc<Service1> }
    struct Service3 { _s2: Arc<Service2> }
    struct Service4 { _s3: Arc<Service3> }
    struct Service5 { _s4: Arc<Service4> }
    struct Service6 { _s5: Arc<Service5> }
    struct Service7 { _s6: Arc<Service6> }
    struct Service8 { _s7: Arc<Service7> }

    let container = Container::new();
    container.bind(Lifetime::Transient, Source::class::<Service1>(vec![], |_| Ok(Service1))).unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service2>(vec![Param::typed::<Service1>("d")], |a| Ok(Service2 { _s1: a.get("d")? })))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service3>(vec![Param::typed::<Service2>("d")], |a| Ok(Service3 { _s2: a.get("d")? })))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service4>(vec![Param::typed::<Service3>("d")], |a| Ok(Service4 { _s3: a.get("d")? })))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service5>(vec![Param::typed::<Service4>("d")], |a| Ok(Service5 { _s4: a.get("d")? })))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service6>(vec![Param::typed::<Service5>("d")], |a| Ok(Service6 { _s5: a.get("d")? })))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service7>(vec![Param::typed::<Service6>("d")], |a| Ok(Service7 { _s6: a.get("d")? })))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<Service8>(vec![Param::typed::<Service7>("d")], |a| Ok(Service8 { _s7: a.get("d")? })))
        .unwrap();

    group.bench_function("transient_chain_depth_8", |b| {
        b.iter(|| {
            let service = container.get_type::<Service8>().unwrap();
            black_box(&service);
        })
    });

    let unchecked = Container::with_config(ContainerConfig::default().detect_cycles(false));
    unchecked.bind(Lifetime::Transient, Source::class::<Service1>(vec![], |_| Ok(Service1))).unwrap();
    unchecked
        .bind(Lifetime::Transient, Source::class::<Service2>(vec![Param::typed::<Service1>("d")], |a| Ok(Service2 { _s1: a.get("d")? })))
        .unwrap();

    group.bench_function("depth_2_without_cycle_detection", |b| {
        b.iter(|| {
            let service = unchecked.get_type::<Service2>().unwrap();
            black_box(&service);
        })
    });

    group.finish();
}

fn bench_async_resolution(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let mut group = c.benchmark_group("async_resolution");

    let container = Container::new();
    let token = container
        .bind(Lifetime::Singleton, Source::async_factory("settings", vec![], |_| async { Ok(7u32) }))
        .unwrap();
    runtime.block_on(container.get_async(&token)).unwrap();

    group.bench_function("async_singleton_hit", |b| {
        b.iter(|| {
            let v = runtime.block_on(container.get_async(&token)).unwrap();
            black_box(v);
        })
    });

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");

    let container = Container::new();
    let token = container
        .bind(Lifetime::Singleton, Source::factory("answer", vec![], |_| Ok(42u64)))
        .unwrap();

    // Prime the singleton
    let _ = container.get(&token).unwrap();

    for &thread_count in &[1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("singleton_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    std::thread::scope(|s| {
                        for _ in 0..threads {
                            let container = &container;
                            s.spawn(move || {
                                for _ in 0..iters / threads as u64 {
                                    let v = container.get(&token).unwrap();
                                    black_box(v);
                                }
                            });
                        }
                    });
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

// ===== Macro Benchmarks =====

fn bench_large_registry(c: &mut Criterion) {
    const NAMES: [&str; 10] = ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9"];

    let mut group = c.benchmark_group("large_registry");

    for &service_count in &[1usize, 5, 10] {
        let container = Container::new();
        let answer = container
            .bind(Lifetime::Singleton, Source::factory("answer", vec![], |_| Ok(42u64)))
            .unwrap();
        for (i, name) in NAMES.iter().take(service_count).enumerate() {
            let value = i as u32;
            container
                .bind(Lifetime::Singleton, Source::factory(*name, vec![], move |_| Ok(value)))
                .unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("resolve_from_registry", service_count),
            &service_count,
            |b, _| {
                b.iter(|| {
                    let v = container.get(&answer).unwrap();
                    black_box(v);
                })
            },
        );
    }

    group.finish();
}

fn bench_mixed_workload(c: &mut Criterion) {
    // Simulate realistic workload: 70% singleton hits, 20% request hits, 10% transient
    struct SingletonService(u64);
    struct RequestService(u64);
    struct TransientService(u64);

    let container = Container::new();
    container
        .bind(Lifetime::Singleton, Source::class::<SingletonService>(vec![], |_| Ok(SingletonService(1))))
        .unwrap();
    container
        .bind(Lifetime::Request, Source::class::<RequestService>(vec![], |_| Ok(RequestService(2))))
        .unwrap();
    container
        .bind(Lifetime::Transient, Source::class::<TransientService>(vec![], |_| Ok(TransientService(3))))
        .unwrap();

    let scope = container.enter_scope();

    // Prime services
    let _ = container.get_type::<SingletonService>().unwrap();
    let _ = container.get_type::<RequestService>().unwrap();

    c.bench_function("mixed_workload_realistic", |b| {
        b.iter(|| {
            // 70% singleton hits
            for _ in 0..7 {
                let v = container.get_type::<SingletonService>().unwrap();
                black_box(v.0);
            }

            // 20% request hits
            for _ in 0..2 {
                let v = container.get_type::<RequestService>().unwrap();
                black_box(v.0);
            }

            // 10% transient
            let v = container.get_type::<TransientService>().unwrap();
            black_box(v.0);
        })
    });

    container.exit_scope(scope);
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_request_vs_transient,
    bench_scope_lifecycle,
    bench_teardown,
    bench_parameter_chain,
    bench_async_resolution,
    bench_contention
);

criterion_group!(macro_benches, bench_large_registry, bench_mixed_workload);

criterion_main!(micro_benches, macro_benches);
