use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use fincache_core::ReconcileConfig;
use fincache_reconcile::{DocumentCache, ReconcileOptions, Reconciler};
use fincache_test_utils::fixtures::{latest, seeded_store, subject};
use fincache_test_utils::mocks::{ScriptedGenerator, StaticProbe};
use std::hint::black_box;
use std::sync::Arc;

fn bench_all_fresh(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("build runtime");
    let store = rt.block_on(seeded_store(&subject(), ["FY2025", "Q3FY25", "Q3FY25"], Utc::now()));
    let reconciler = Reconciler::new(
        Arc::new(StaticProbe::new(latest("FY2025", "Q3FY25", "Q3FY25"))),
        Arc::new(ScriptedGenerator::new()),
        Arc::new(store),
        Arc::new(DocumentCache::new()),
        ReconcileConfig::default(),
    )
    .expect("build reconciler");
    let key = subject();

    c.bench_function("reconcile/all_fresh", |b| {
        b.to_async(&rt).iter(|| async {
            let bundle = reconciler.reconcile(black_box(&key), ReconcileOptions::default()).await;
            black_box(bundle.generation_calls);
        });
    });
}

criterion_group!(benches, bench_all_fresh);
criterion_main!(benches);
