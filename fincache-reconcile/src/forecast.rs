//! Cached price predictions.
//!
//! A prediction blends the numeric ensemble with an optional narrative
//! estimate. Blended results are cached for the analysis window, current
//! prices for the price window.

use async_trait::async_trait;
use fincache_analysis::{Ensemble, EnsembleReport, ModelPredictions, PredictionCompositor};
use fincache_core::{
    BlendedForecast, Clock, FincacheResult, ForecastConfig, ForecastError, ForecastSet,
    ForecastSource, SubjectKey, SystemClock, ValidationError,
};
use fincache_storage::{CacheStats, TtlCache};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Number of daily predictions requested from the numeric models.
pub const PREDICTION_DAYS: usize = 30;

// ============================================================================
// PROVIDER CONTRACTS
// ============================================================================

/// Independent producer of a forecast set (numeric model or LLM narrative).
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn forecast(&self, subject: &SubjectKey) -> FincacheResult<ForecastSet>;
}

/// Source of the latest traded price.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn latest_price(&self, subject: &SubjectKey) -> FincacheResult<f64>;
}

/// Trained numeric models producing per-model daily series.
#[async_trait]
pub trait PredictionModels: Send + Sync {
    async fn predict(&self, subject: &SubjectKey, days: usize) -> FincacheResult<ModelPredictions>;
}

/// Numeric [`ForecastProvider`] backed by the weighted model ensemble.
pub struct EnsembleForecaster<M> {
    models: M,
    ensemble: Ensemble,
}

impl<M: PredictionModels> EnsembleForecaster<M> {
    pub fn new(models: M, ensemble: Ensemble) -> Self {
        Self { models, ensemble }
    }

    /// Chart, per-model series and signals for `history` (daily closes,
    /// oldest first). History is checked before the models are asked.
    pub async fn report(
        &self,
        subject: &SubjectKey,
        history: &[f64],
        current_price: f64,
    ) -> FincacheResult<EnsembleReport> {
        if history.len() < fincache_analysis::MIN_DAILY_HISTORY {
            return Err(ValidationError::ConstraintViolation {
                constraint: "min_daily_history".to_string(),
                reason: format!(
                    "need at least {} historical prices, got {}",
                    fincache_analysis::MIN_DAILY_HISTORY,
                    history.len()
                ),
            }
            .into());
        }
        let predictions = self.models.predict(subject, PREDICTION_DAYS).await?;
        self.ensemble
            .report(subject.clone(), history, current_price, &predictions)
    }
}

#[async_trait]
impl<M: PredictionModels> ForecastProvider for EnsembleForecaster<M> {
    async fn forecast(&self, subject: &SubjectKey) -> FincacheResult<ForecastSet> {
        let predictions = self.models.predict(subject, PREDICTION_DAYS).await?;
        self.ensemble.forecast(subject.clone(), &predictions)
    }
}

// ============================================================================
// PREDICTION SERVICE
// ============================================================================

/// A blended forecast and whether it was served from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub forecast: BlendedForecast,
    pub cached: bool,
}

async fn with_timeout<T>(
    limit: Duration,
    provider: ForecastSource,
    call: impl Future<Output = FincacheResult<T>>,
) -> FincacheResult<T> {
    timeout(limit, call).await.map_err(|_| ForecastError::Timeout {
        provider,
        elapsed: limit,
    })?
}

pub struct PredictionService<C: Clock + Clone = SystemClock> {
    numeric: Arc<dyn ForecastProvider>,
    narrative: Option<Arc<dyn ForecastProvider>>,
    prices: Arc<dyn PriceFeed>,
    compositor: PredictionCompositor,
    forecasts: TtlCache<SubjectKey, BlendedForecast, C>,
    price_cache: TtlCache<SubjectKey, f64, C>,
    config: ForecastConfig,
}

impl PredictionService<SystemClock> {
    pub fn new(
        numeric: Arc<dyn ForecastProvider>,
        prices: Arc<dyn PriceFeed>,
        config: ForecastConfig,
    ) -> FincacheResult<Self> {
        Self::with_clock(numeric, prices, config, SystemClock)
    }
}

impl<C: Clock + Clone> PredictionService<C> {
    pub fn with_clock(
        numeric: Arc<dyn ForecastProvider>,
        prices: Arc<dyn PriceFeed>,
        config: ForecastConfig,
        clock: C,
    ) -> FincacheResult<Self> {
        config.validate()?;
        Ok(Self {
            numeric,
            narrative: None,
            prices,
            compositor: PredictionCompositor::new(config.weights)?,
            forecasts: TtlCache::with_clock(clock.clone()),
            price_cache: TtlCache::with_clock(clock),
            config,
        })
    }

    pub fn with_narrative(mut self, narrative: Arc<dyn ForecastProvider>) -> Self {
        self.narrative = Some(narrative);
        self
    }

    /// Cached blended forecast for `subject`, computing it on a miss.
    ///
    /// # Errors
    /// Fails when the numeric provider fails, times out or answers for another
    /// subject. Narrative and price failures degrade the result instead.
    pub async fn predict(&self, subject: &SubjectKey) -> FincacheResult<Prediction> {
        if let Some(hit) = self.forecasts.get(subject, self.config.durations.analysis) {
            tracing::debug!(subject = %subject, age = ?hit.age, "Serving cached prediction");
            return Ok(Prediction {
                forecast: hit.value,
                cached: true,
            });
        }

        let (numeric, narrative, price) = tokio::join!(
            with_timeout(
                self.config.provider_timeout,
                ForecastSource::Numeric,
                self.numeric.forecast(subject),
            ),
            self.narrative_forecast(subject),
            self.current_price(subject),
        );
        let numeric = numeric?;
        if numeric.subject_key != *subject {
            return Err(ValidationError::SubjectMismatch {
                expected: subject.to_string(),
                got: numeric.subject_key.to_string(),
            }
            .into());
        }

        let forecast = self.compositor.compose(
            &numeric,
            narrative.as_ref(),
            price,
            self.forecasts.clock().now(),
        )?;
        self.forecasts.put(subject.clone(), forecast.clone());
        tracing::info!(
            subject = %subject,
            points = forecast.points.len(),
            narrative = narrative.is_some(),
            "Computed prediction"
        );

        Ok(Prediction {
            forecast,
            cached: false,
        })
    }

    async fn narrative_forecast(&self, subject: &SubjectKey) -> Option<ForecastSet> {
        let provider = self.narrative.as_ref()?;
        let call = provider.forecast(subject);
        match with_timeout(self.config.provider_timeout, ForecastSource::Narrative, call).await {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Narrative forecast unavailable, using numeric only");
                None
            }
        }
    }

    /// Latest price, cached for the price window. `None` on any failure.
    pub async fn current_price(&self, subject: &SubjectKey) -> Option<f64> {
        if let Some(hit) = self.price_cache.get(subject, self.config.durations.price) {
            return Some(hit.value);
        }
        let price = match timeout(self.config.price_timeout, self.prices.latest_price(subject)).await {
            Ok(Ok(price)) if price.is_finite() && price > 0.0 => price,
            Ok(Ok(price)) => {
                tracing::warn!(subject = %subject, price, "Price feed returned an unusable price");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(subject = %subject, error = %e, "Price feed failed");
                return None;
            }
            Err(_) => {
                let e = ForecastError::PriceUnavailable {
                    subject: subject.to_string(),
                    reason: format!("timed out after {:?}", self.config.price_timeout),
                };
                tracing::warn!(subject = %subject, error = %e, "Price feed timed out");
                return None;
            }
        };
        self.price_cache.put(subject.clone(), price);
        Some(price)
    }

    /// Drop the cached prediction and price for `subject`.
    pub fn invalidate(&self, subject: &SubjectKey) -> bool {
        self.price_cache.invalidate(subject);
        self.forecasts.invalidate(subject)
    }

    pub fn clear(&self) {
        self.forecasts.clear();
        self.price_cache.clear();
    }

    pub fn cached_predictions(&self) -> usize {
        self.forecasts.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.forecasts.stats()
    }
}

impl<C: Clock + Clone> std::fmt::Debug for PredictionService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("narrative", &self.narrative.is_some())
            .field("forecasts", &self.forecasts)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
