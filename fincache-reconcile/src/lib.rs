//! FINCACHE RECONCILE - Request Orchestration
//!
//! Ties the cache, document store, version probe, generator, recovery and
//! validation together into one per-request flow, plus the cached
//! prediction service.

pub mod bundle;
pub mod forecast;
pub mod reconciler;

pub use bundle::{Bundle, ClassOutcome, ReconcileOptions};
pub use forecast::{
    EnsembleForecaster, ForecastProvider, Prediction, PredictionModels, PredictionService, PriceFeed,
    PREDICTION_DAYS,
};
pub use reconciler::{document_label, DocumentCache, DocumentKey, Reconciler, UNVERSIONED_LABEL};
