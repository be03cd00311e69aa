//! Performance benchmarks for edge checking.
//!
//! Run with: `cargo bench --bench checker`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Compiled check | <10µs p99 | Expressions parsed once |
//! | Raw check | <100µs p99 | Expressions parsed per call |
//! | Engine check | <20µs p99 | Resolver + compiler cache hits |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use keri_governance::patterns::vlei_standard_framework;
use keri_governance::{
    Attributes, ConstraintChecker, ConstraintCompiler, ConstraintRule, ContentSaid, EdgeContext,
    EdgeOperator, GovernanceConfig, GovernanceEngine, GovernanceFramework, FrameworkDraft,
    InMemoryCredentialStore,
};

/// vLEI framework with `extra` additional field-constrained rules on `qvi_issue`.
fn make_framework(extra: usize) -> GovernanceFramework {
    let mut standard = vlei_standard_framework();
    for i in 0..extra {
        standard.rules.push(
            ConstraintRule::new(format!("extra-{}", i), "qvi_issue", EdgeOperator::Any)
                .with_field_constraint("level", format!("$subject.level >= {}", i % 3))
                .with_field_constraint("region", "$issuer.jurisdiction == $subject.country"),
        );
    }
    standard.into_draft("bench", "1.0.0").issue(&ContentSaid)
}

fn make_context() -> EdgeContext {
    EdgeContext::new("qvi_issue", EdgeOperator::Di2i)
        .with_issuer(Attributes::new().with("jurisdiction", "US"))
        .with_subject(
            Attributes::new()
                .with("country", "US")
                .with("level", 5)
                .with("issuance_date", "2025-01-15")
                .with("expiry_date", "2026-01-15"),
        )
        .at(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
}

/// Benchmark checking against precompiled rules.
fn bench_compiled_check(c: &mut Criterion) {
    let checker = ConstraintChecker::new();
    let ctx = make_context();

    let mut group = c.benchmark_group("compiled_check");

    for extra in [0, 10, 50] {
        let framework = make_framework(extra);
        let compiled = ConstraintCompiler::uncached().compile(&framework);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("extra_rules", extra), &compiled, |b, compiled| {
            b.iter(|| {
                let result = checker.check(black_box(&ctx), compiled);
                assert!(result.allowed);
                result
            })
        });
    }

    group.finish();
}

/// Benchmark checking raw rules, parsing every expression per call.
fn bench_raw_check(c: &mut Criterion) {
    let checker = ConstraintChecker::new();
    let ctx = make_context();

    let mut group = c.benchmark_group("raw_check");

    for extra in [0, 10, 50] {
        let framework = make_framework(extra);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("extra_rules", extra), &framework, |b, framework| {
            b.iter(|| {
                let result = checker.check(black_box(&ctx), framework);
                assert!(result.allowed);
                result
            })
        });
    }

    group.finish();
}

/// Benchmark compilation without the cache.
fn bench_compile(c: &mut Criterion) {
    let framework = make_framework(50);
    c.bench_function("compile_uncached", |b| {
        b.iter(|| ConstraintCompiler::compile_rules(&framework.said, black_box(&framework.rules)))
    });
}

/// Benchmark the engine path: resolve active version, compile (cached), check.
fn bench_engine_check(c: &mut Criterion) {
    let store = Arc::new(InMemoryCredentialStore::new());
    let said = store
        .insert_credential(make_framework(10).raw)
        .unwrap_or_default();
    let engine = GovernanceEngine::new(store, GovernanceConfig::default());
    let ctx = make_context();

    // Warm the resolver and compiler caches
    assert!(engine.check_edge(&said, &ctx).allowed);

    c.bench_function("engine_check_edge", |b| {
        b.iter(|| {
            let result = engine.check_edge(black_box(&said), black_box(&ctx));
            assert!(result.allowed);
            result
        })
    });
}

/// Benchmark multi-threaded access to a shared engine.
fn bench_engine_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_contention");

    for num_threads in [1, 2, 4, 8] {
        let store = Arc::new(InMemoryCredentialStore::new());
        let saids: Vec<String> = (0..num_threads)
            .map(|i| {
                let framework = FrameworkDraft::new(format!("fw-{}", i), "1.0.0")
                    .with_rules(vlei_standard_framework().rules)
                    .issue(&ContentSaid);
                store.insert_credential(framework.raw).unwrap_or_default()
            })
            .collect();
        let engine = Arc::new(GovernanceEngine::new(store, GovernanceConfig::default()));
        let ctx = make_context();

        // Warm the caches
        for said in &saids {
            engine.check_edge(said, &ctx);
        }

        group.throughput(Throughput::Elements(num_threads as u64));
        group.bench_with_input(BenchmarkId::new("threads", num_threads), &num_threads, |b, &n| {
            b.iter(|| {
                let handles: Vec<_> = (0..n)
                    .map(|i| {
                        let engine = Arc::clone(&engine);
                        let said = saids[i].clone();
                        let ctx = ctx.clone();
                        thread::spawn(move || {
                            for _ in 0..100 {
                                let result = engine.check_edge(black_box(&said), &ctx);
                                assert!(result.allowed);
                            }
                        })
                    })
                    .collect();

                for h in handles {
                    h.join().unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compiled_check,
    bench_raw_check,
    bench_compile,
    bench_engine_check,
    bench_engine_contention,
);
criterion_main!(benches);
