//! Short-range prediction from recent price ticks.
//!
//! A least-squares line through the ticks is extended to each horizon and
//! nudged by recent momentum. The band widens with the square root of the
//! number of ticks ahead.

use fincache_core::{FincacheResult, SubjectKey, ValidationError};
use serde::{Deserialize, Serialize};

use crate::{round2, round_to};

/// Fewest ticks a prediction is made from.
pub const MIN_INTRADAY_TICKS: usize = 10;
pub const DEFAULT_TICK_INTERVAL_SECS: u32 = 60;

const MOMENTUM_LOOKBACK: usize = 4;
const MOMENTUM_WEIGHT: f64 = 0.3;
const VOLATILITY_WINDOW: usize = 20;
const BAND_WIDTH_STDS: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntradayHorizon {
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "30min")]
    Min30,
}

impl IntradayHorizon {
    pub const ALL: [IntradayHorizon; 3] =
        [IntradayHorizon::Min5, IntradayHorizon::Min15, IntradayHorizon::Min30];

    pub fn minutes(&self) -> u32 {
        match self {
            IntradayHorizon::Min5 => 5,
            IntradayHorizon::Min15 => 15,
            IntradayHorizon::Min30 => 30,
        }
    }

    /// Ticks ahead at the given spacing, never fewer than one.
    pub fn steps(&self, interval_secs: u32) -> u32 {
        (self.minutes() * 60 / interval_secs).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntradayPoint {
    pub horizon: IntradayHorizon,
    pub price: f64,
    pub upper: f64,
    pub lower: f64,
    pub direction: Direction,
    /// Percent change from the last tick, at 3dp.
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayForecast {
    pub subject_key: SubjectKey,
    pub current_price: f64,
    pub points: Vec<IntradayPoint>,
    pub momentum: f64,
    pub volatility: f64,
    /// Sign of the mean tick change over the volatility window.
    pub trend: Direction,
}

impl IntradayForecast {
    pub fn point(&self, horizon: IntradayHorizon) -> Option<&IntradayPoint> {
        self.points.iter().find(|p| p.horizon == horizon)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntradayPredictor {
    interval_secs: u32,
}

impl Default for IntradayPredictor {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}

/// Least-squares `(intercept, slope)` over `x = 0..n`.
fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let (cov, var) = values.iter().enumerate().fold((0.0, 0.0), |(c, v), (i, y)| {
        let dx = i as f64 - mean_x;
        (c + dx * (y - mean_y), v + dx * dx)
    });
    let slope = if var == 0.0 { 0.0 } else { cov / var };
    (mean_y - slope * mean_x, slope)
}

impl IntradayPredictor {
    pub fn new(interval_secs: u32) -> FincacheResult<Self> {
        if interval_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "interval_seconds".to_string(),
                reason: "tick interval must be at least one second".to_string(),
            }
            .into());
        }
        Ok(Self { interval_secs })
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    /// Predict 5, 15 and 30 minutes past the last of `ticks` (oldest first).
    ///
    /// # Errors
    /// * `ValidationError::ConstraintViolation` - fewer than [`MIN_INTRADAY_TICKS`] ticks
    /// * `ValidationError::InvalidValue` - a tick is not finite, or the last one is zero
    pub fn predict(&self, subject: SubjectKey, ticks: &[f64]) -> FincacheResult<IntradayForecast> {
        if ticks.len() < MIN_INTRADAY_TICKS {
            return Err(ValidationError::ConstraintViolation {
                constraint: "min_intraday_ticks".to_string(),
                reason: format!(
                    "need at least {MIN_INTRADAY_TICKS} recent prices, got {}",
                    ticks.len()
                ),
            }
            .into());
        }
        if let Some(bad) = ticks.iter().find(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidValue {
                field: "recent_prices".to_string(),
                reason: format!("{bad} is not a finite price"),
            }
            .into());
        }
        let n = ticks.len();
        let last = ticks[n - 1];
        if last == 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "recent_prices".to_string(),
                reason: "last price is zero".to_string(),
            }
            .into());
        }

        let (intercept, slope) = linear_fit(ticks);
        let momentum = last - ticks[n - 1 - MOMENTUM_LOOKBACK];

        let window = &ticks[n.saturating_sub(VOLATILITY_WINDOW)..];
        let changes: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let avg_change = changes.iter().sum::<f64>() / changes.len() as f64;
        let volatility = (changes.iter().map(|c| (c - avg_change).powi(2)).sum::<f64>()
            / changes.len() as f64)
            .sqrt();

        let points = IntradayHorizon::ALL
            .iter()
            .map(|&horizon| {
                let steps = f64::from(horizon.steps(self.interval_secs));
                let trend = intercept + slope * (n as f64 + steps);
                let price = trend + momentum * (steps / 5.0) * MOMENTUM_WEIGHT;
                let spread = BAND_WIDTH_STDS * volatility * steps.sqrt();
                IntradayPoint {
                    horizon,
                    price: round2(price),
                    upper: round2(price + spread),
                    lower: round2(price - spread),
                    direction: if price > last { Direction::Up } else { Direction::Down },
                    change_pct: round_to((price - last) / last * 100.0, 3),
                }
            })
            .collect();

        Ok(IntradayForecast {
            subject_key: subject,
            current_price: round2(last),
            points,
            momentum: round_to(momentum, 4),
            volatility: round_to(volatility, 4),
            trend: if avg_change > 0.0 { Direction::Up } else { Direction::Down },
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
