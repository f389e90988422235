//! FINCACHE ANALYSIS - Validation and Forecast Composition
//!
//! Pure, synchronous checks and blends that sit between generation and
//! storage: the balance-sheet validator, the numeric model ensemble with its
//! technical signals, intraday tick prediction and the numeric/narrative
//! prediction compositor.

pub mod compositor;
pub mod ensemble;
pub mod intraday;
pub mod signals;
pub mod validator;

pub use compositor::PredictionCompositor;
pub use ensemble::{
    ChartPoint, ChartPointKind, Ensemble, EnsembleDay, EnsembleReport, HorizonSummary,
    ModelPredictions, CHART_HISTORY_DAYS, MIN_DAILY_HISTORY,
};
pub use intraday::{
    Direction, IntradayForecast, IntradayHorizon, IntradayPoint, IntradayPredictor,
    DEFAULT_TICK_INTERVAL_SECS, MIN_INTRADAY_TICKS,
};
pub use signals::{MacdTrend, RsiSignal, TechnicalSignals};
pub use validator::{
    FinancialValidator, ValidationReport, DERIVED_LIABILITIES_CURRENT, DERIVED_LIABILITIES_PREVIOUS,
};

/// Round to two decimal places, the precision prices and figures are reported at.
pub(crate) fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
