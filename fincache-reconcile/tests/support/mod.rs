#![allow(dead_code)]

use async_trait::async_trait;
use fincache_core::{FincacheResult, ForecastError, ForecastSet, ForecastSource, ReconcileConfig, SubjectKey};
use fincache_analysis::ModelPredictions;
use fincache_llm::{Generator, VersionProbe};
use fincache_reconcile::{DocumentCache, ForecastProvider, PredictionModels, PriceFeed, Reconciler};
use fincache_test_utils::mocks::{FlakyStore, ScriptedGenerator};
use fincache_test_utils::ManualClock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// RECONCILER HARNESS
// ============================================================================

pub struct Harness {
    pub reconciler: Reconciler<ManualClock>,
    pub generator: ScriptedGenerator,
    pub store: FlakyStore,
    pub cache: Arc<DocumentCache<ManualClock>>,
    pub clock: ManualClock,
}

pub fn harness(
    probe: Arc<dyn VersionProbe>,
    generator: ScriptedGenerator,
    store: FlakyStore,
    clock: ManualClock,
    config: ReconcileConfig,
) -> Harness {
    harness_with(probe, Arc::new(generator.clone()), generator, store, clock, config)
}

/// Harness whose reconciler calls `dispatch` while `generator` is kept
/// for call inspection.
pub fn harness_with(
    probe: Arc<dyn VersionProbe>,
    dispatch: Arc<dyn Generator>,
    generator: ScriptedGenerator,
    store: FlakyStore,
    clock: ManualClock,
    config: ReconcileConfig,
) -> Harness {
    let cache = Arc::new(DocumentCache::<ManualClock>::with_clock(clock.clone()));
    let reconciler = Reconciler::new(probe, dispatch, Arc::new(store.clone()), cache.clone(), config)
        .expect("valid reconcile config");
    Harness {
        reconciler,
        generator,
        store,
        cache,
        clock,
    }
}

// ============================================================================
// FORECAST DOUBLES
// ============================================================================

/// Provider answering with a fixed set, or failing.
pub struct StaticForecast {
    result: Result<ForecastSet, ForecastSource>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticForecast {
    pub fn new(set: ForecastSet) -> Self {
        Self {
            result: Ok(set),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(provider: ForecastSource) -> Self {
        Self {
            result: Err(provider),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastProvider for StaticForecast {
    async fn forecast(&self, _subject: &SubjectKey) -> FincacheResult<ForecastSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.result {
            Ok(set) => Ok(set.clone()),
            Err(provider) => Err(ForecastError::ProviderFailed {
                provider: *provider,
                reason: "model service returned 500".to_string(),
            }
            .into()),
        }
    }
}

/// Price feed with a fixed answer.
pub struct StaticPriceFeed {
    price: Option<f64>,
    calls: AtomicUsize,
}

impl StaticPriceFeed {
    pub fn new(price: f64) -> Self {
        Self {
            price: Some(price),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            price: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn latest_price(&self, subject: &SubjectKey) -> FincacheResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.price.ok_or_else(|| {
            ForecastError::PriceUnavailable {
                subject: subject.to_string(),
                reason: "market closed".to_string(),
            }
            .into()
        })
    }
}

/// Models returning the same series for every subject.
pub struct FixedModels(pub ModelPredictions);

#[async_trait]
impl PredictionModels for FixedModels {
    async fn predict(&self, _subject: &SubjectKey, days: usize) -> FincacheResult<ModelPredictions> {
        let take = |series: &Vec<f64>| -> Vec<f64> { series.iter().copied().take(days).collect() };
        Ok(ModelPredictions {
            lstm: take(&self.0.lstm),
            random_forest: take(&self.0.random_forest),
            linear: take(&self.0.linear),
        })
    }
}
