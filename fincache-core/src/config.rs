//! Configuration types

use crate::{CacheDurationClass, ConfigError, DocumentClass, FincacheError, FincacheResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

fn invalid(field: &str, value: impl ToString, reason: &str) -> FincacheError {
    FincacheError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .and_then(|s| match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

// ============================================================================
// CACHE DURATIONS
// ============================================================================

/// Freshness windows per duration class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDurations {
    pub price: Duration,
    pub default: Duration,
    pub analysis: Duration,
    pub fundamentals: Duration,
    pub quarterly_document: Duration,
    pub annual_document: Duration,
}

impl Default for CacheDurations {
    fn default() -> Self {
        Self {
            price: Duration::from_secs(5 * MINUTE),
            default: Duration::from_secs(15 * MINUTE),
            analysis: Duration::from_secs(24 * HOUR),
            fundamentals: Duration::from_secs(24 * HOUR),
            quarterly_document: Duration::from_secs(90 * DAY),
            annual_document: Duration::from_secs(180 * DAY),
        }
    }
}

impl CacheDurations {
    pub fn duration(&self, class: CacheDurationClass) -> Duration {
        match class {
            CacheDurationClass::Price => self.price,
            CacheDurationClass::Default => self.default,
            CacheDurationClass::Analysis => self.analysis,
            CacheDurationClass::Fundamentals => self.fundamentals,
            CacheDurationClass::QuarterlyDocument => self.quarterly_document,
            CacheDurationClass::AnnualDocument => self.annual_document,
        }
    }

    pub fn duration_for(&self, class: DocumentClass) -> Duration {
        self.duration(class.duration_class())
    }

    pub fn validate(&self) -> FincacheResult<()> {
        let all = [
            ("durations.price", self.price),
            ("durations.default", self.default),
            ("durations.analysis", self.analysis),
            ("durations.fundamentals", self.fundamentals),
            ("durations.quarterly_document", self.quarterly_document),
            ("durations.annual_document", self.annual_document),
        ];
        for (field, duration) in all {
            if duration.is_zero() {
                return Err(invalid(field, format!("{:?}", duration), "must be positive"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// VALIDATOR CONFIG
// ============================================================================

/// Tolerances used by the financial validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Liabilities closer than this to total assets are treated as a
    /// mis-extracted assets figure.
    pub liabilities_epsilon: f64,
    /// Relative tolerance for `assets = equity + liabilities`.
    pub equation_tolerance: f64,
    /// Minimum order-of-magnitude gap between integer and decimal figures
    /// before a unit mix is flagged.
    pub scale_gap_orders: u32,
    /// Plausible lower bound for total assets, when one applies.
    pub min_total_assets: Option<f64>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            liabilities_epsilon: 10.0,
            equation_tolerance: 0.02,
            scale_gap_orders: 2,
            min_total_assets: None,
        }
    }
}

impl ValidatorConfig {
    pub fn with_min_total_assets(mut self, minimum: f64) -> Self {
        self.min_total_assets = Some(minimum);
        self
    }

    pub fn validate(&self) -> FincacheResult<()> {
        if !self.liabilities_epsilon.is_finite() || self.liabilities_epsilon < 0.0 {
            return Err(invalid(
                "validator.liabilities_epsilon",
                self.liabilities_epsilon,
                "liabilities_epsilon must be finite and non-negative",
            ));
        }
        if !(self.equation_tolerance > 0.0 && self.equation_tolerance < 1.0) {
            return Err(invalid(
                "validator.equation_tolerance",
                self.equation_tolerance,
                "equation_tolerance must be between 0.0 and 1.0 (exclusive)",
            ));
        }
        if self.scale_gap_orders == 0 {
            return Err(invalid(
                "validator.scale_gap_orders",
                self.scale_gap_orders,
                "scale_gap_orders must be at least 1",
            ));
        }
        if let Some(min) = self.min_total_assets {
            if !min.is_finite() || min < 0.0 {
                return Err(invalid(
                    "validator.min_total_assets",
                    min,
                    "min_total_assets must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// BLEND / ENSEMBLE WEIGHTS
// ============================================================================

fn check_weights(fields: &[(&str, f64)]) -> FincacheResult<()> {
    for (field, w) in fields {
        if !w.is_finite() || *w < 0.0 {
            return Err(invalid(field, w, "weight must be finite and non-negative"));
        }
    }
    let sum: f64 = fields.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > 1e-9 {
        return Err(invalid(fields[0].0, sum, "weights must sum to 1.0"));
    }
    Ok(())
}

/// Weights of the numeric and narrative forecasts in a blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub numeric: f64,
    pub narrative: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            numeric: 0.7,
            narrative: 0.3,
        }
    }
}

impl BlendWeights {
    pub fn new(numeric: f64, narrative: f64) -> FincacheResult<Self> {
        let weights = Self { numeric, narrative };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> FincacheResult<()> {
        check_weights(&[
            ("weights.numeric", self.numeric),
            ("weights.narrative", self.narrative),
        ])
    }
}

/// Weights of the individual models inside the numeric ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub lstm: f64,
    pub random_forest: f64,
    pub linear: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            lstm: 0.5,
            random_forest: 0.3,
            linear: 0.2,
        }
    }
}

impl EnsembleWeights {
    pub fn validate(&self) -> FincacheResult<()> {
        check_weights(&[
            ("ensemble.lstm", self.lstm),
            ("ensemble.random_forest", self.random_forest),
            ("ensemble.linear", self.linear),
        ])
    }
}

// ============================================================================
// RECONCILE CONFIG
// ============================================================================

/// Reconciler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub probe_timeout: Duration,
    pub generation_timeout: Duration,
    pub store_timeout: Duration,
    /// Run regenerations one at a time (upstream rate limits).
    pub serialize_generation: bool,
    /// Lower bound for annual total assets; quarterly documents are exempt.
    pub min_annual_total_assets: Option<f64>,
    pub validator: ValidatorConfig,
    pub durations: CacheDurations,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            generation_timeout: Duration::from_secs(60),
            store_timeout: Duration::from_secs(5),
            serialize_generation: false,
            min_annual_total_assets: Some(1000.0),
            validator: ValidatorConfig::default(),
            durations: CacheDurations::default(),
        }
    }
}

impl ReconcileConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `FINCACHE_PROBE_TIMEOUT_MS` (default: 5000)
    /// - `FINCACHE_GENERATION_TIMEOUT_MS` (default: 60000)
    /// - `FINCACHE_STORE_TIMEOUT_MS` (default: 5000)
    /// - `FINCACHE_SERIALIZE_GENERATION` (default: false)
    /// - `FINCACHE_MIN_ANNUAL_TOTAL_ASSETS` (default: 1000; `0` disables)
    /// - `FINCACHE_EQUATION_TOLERANCE` (default: 0.02)
    /// - `FINCACHE_LIABILITIES_EPSILON` (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let min_annual_total_assets = match env_parse::<f64>("FINCACHE_MIN_ANNUAL_TOTAL_ASSETS") {
            Some(v) if v == 0.0 => None,
            Some(v) => Some(v),
            None => defaults.min_annual_total_assets,
        };

        Self {
            probe_timeout: env_millis("FINCACHE_PROBE_TIMEOUT_MS").unwrap_or(defaults.probe_timeout),
            generation_timeout: env_millis("FINCACHE_GENERATION_TIMEOUT_MS")
                .unwrap_or(defaults.generation_timeout),
            store_timeout: env_millis("FINCACHE_STORE_TIMEOUT_MS").unwrap_or(defaults.store_timeout),
            serialize_generation: env_flag("FINCACHE_SERIALIZE_GENERATION")
                .unwrap_or(defaults.serialize_generation),
            min_annual_total_assets,
            validator: ValidatorConfig {
                equation_tolerance: env_parse("FINCACHE_EQUATION_TOLERANCE")
                    .unwrap_or(defaults.validator.equation_tolerance),
                liabilities_epsilon: env_parse("FINCACHE_LIABILITIES_EPSILON")
                    .unwrap_or(defaults.validator.liabilities_epsilon),
                ..defaults.validator
            },
            durations: defaults.durations,
        }
    }

    /// Validator settings for one document class.
    pub fn validator_for(&self, class: DocumentClass) -> ValidatorConfig {
        match (class, self.min_annual_total_assets) {
            (DocumentClass::Annual, Some(min)) => self.validator.clone().with_min_total_assets(min),
            _ => self.validator.clone(),
        }
    }

    /// Validate the configuration.
    ///
    /// Rejects zero timeouts, tolerances outside (0, 1), negative epsilon
    /// and zero cache durations.
    pub fn validate(&self) -> FincacheResult<()> {
        for (field, timeout) in [
            ("probe_timeout", self.probe_timeout),
            ("generation_timeout", self.generation_timeout),
            ("store_timeout", self.store_timeout),
        ] {
            if timeout.is_zero() {
                return Err(invalid(field, format!("{:?}", timeout), "timeout must be positive"));
            }
        }

        if let Some(min) = self.min_annual_total_assets {
            if !min.is_finite() || min < 0.0 {
                return Err(invalid(
                    "min_annual_total_assets",
                    min,
                    "min_annual_total_assets must be finite and non-negative",
                ));
            }
        }

        self.validator.validate()?;
        self.durations.validate()
    }
}

// ============================================================================
// FORECAST CONFIG
// ============================================================================

/// Prediction service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub provider_timeout: Duration,
    pub price_timeout: Duration,
    pub weights: BlendWeights,
    pub durations: CacheDurations,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(60),
            price_timeout: Duration::from_secs(5),
            weights: BlendWeights::default(),
            durations: CacheDurations::default(),
        }
    }
}

impl ForecastConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `FINCACHE_FORECAST_TIMEOUT_MS` (default: 60000)
    /// - `FINCACHE_PRICE_TIMEOUT_MS` (default: 5000)
    /// - `FINCACHE_NUMERIC_WEIGHT` (default: 0.7; narrative weight is the complement)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let weights = env_parse::<f64>("FINCACHE_NUMERIC_WEIGHT")
            .map(|numeric| BlendWeights {
                numeric,
                narrative: 1.0 - numeric,
            })
            .unwrap_or(defaults.weights);

        Self {
            provider_timeout: env_millis("FINCACHE_FORECAST_TIMEOUT_MS")
                .unwrap_or(defaults.provider_timeout),
            price_timeout: env_millis("FINCACHE_PRICE_TIMEOUT_MS").unwrap_or(defaults.price_timeout),
            weights,
            durations: defaults.durations,
        }
    }

    pub fn validate(&self) -> FincacheResult<()> {
        if self.provider_timeout.is_zero() {
            return Err(invalid(
                "provider_timeout",
                format!("{:?}", self.provider_timeout),
                "timeout must be positive",
            ));
        }
        if self.price_timeout.is_zero() {
            return Err(invalid(
                "price_timeout",
                format!("{:?}", self.price_timeout),
                "timeout must be positive",
            ));
        }
        self.weights.validate()?;
        self.durations.validate()
    }
}

// =============================================================================
// TESTS
// =============================================================================
