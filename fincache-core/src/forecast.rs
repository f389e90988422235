//! Forecast types: per-source forecast sets and the blended result.

use crate::{BlendWeights, SubjectKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// HORIZON
// ============================================================================

/// Forecast horizon.
///
/// Numeric models emit day-granular horizons; narrative estimators usually
/// think in weeks, months and quarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "next_1d")]
    Day1,
    #[serde(rename = "next_5d")]
    Day5,
    #[serde(rename = "next_10d")]
    Day10,
    #[serde(rename = "next_30d")]
    Day30,
    #[serde(rename = "next_90d")]
    Day90,
    #[serde(rename = "next_1w")]
    Week1,
    #[serde(rename = "next_1m")]
    Month1,
    #[serde(rename = "next_1q")]
    Quarter1,
}

impl Horizon {
    /// Summary horizons reported from a daily prediction series.
    pub const SUMMARY: [Horizon; 4] = [Horizon::Day1, Horizon::Day5, Horizon::Day10, Horizon::Day30];

    pub fn label(&self) -> &'static str {
        match self {
            Horizon::Day1 => "next_1d",
            Horizon::Day5 => "next_5d",
            Horizon::Day10 => "next_10d",
            Horizon::Day30 => "next_30d",
            Horizon::Day90 => "next_90d",
            Horizon::Week1 => "next_1w",
            Horizon::Month1 => "next_1m",
            Horizon::Quarter1 => "next_1q",
        }
    }

    /// Zero-based index into a daily prediction series, for day horizons.
    pub fn day_index(&self) -> Option<usize> {
        match self {
            Horizon::Day1 => Some(0),
            Horizon::Day5 => Some(4),
            Horizon::Day10 => Some(9),
            Horizon::Day30 => Some(29),
            Horizon::Day90 => Some(89),
            Horizon::Week1 | Horizon::Month1 | Horizon::Quarter1 => None,
        }
    }

    /// Narrative horizons consulted for this numeric horizon, most specific
    /// first. Fixed table; no interpolation between horizons.
    pub fn narrative_candidates(&self) -> &'static [Horizon] {
        match self {
            Horizon::Day1 => &[Horizon::Day1, Horizon::Week1],
            Horizon::Day5 => &[Horizon::Day5, Horizon::Week1],
            Horizon::Day10 => &[Horizon::Day10, Horizon::Week1, Horizon::Month1],
            Horizon::Day30 => &[Horizon::Day30, Horizon::Month1],
            Horizon::Day90 => &[Horizon::Day90, Horizon::Quarter1],
            Horizon::Week1 => &[Horizon::Week1, Horizon::Day5],
            Horizon::Month1 => &[Horizon::Month1, Horizon::Day30],
            Horizon::Quarter1 => &[Horizon::Quarter1, Horizon::Day90],
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// FORECAST SETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    Numeric,
    Narrative,
}

impl ForecastSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastSource::Numeric => "numeric",
            ForecastSource::Narrative => "narrative",
        }
    }
}

impl fmt::Display for ForecastSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub horizon: Horizon,
    pub price: f64,
    /// `(low, high)` band, when the producer reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_band: Option<(f64, f64)>,
}

impl ForecastPoint {
    pub fn new(horizon: Horizon, price: f64) -> Self {
        Self {
            horizon,
            price,
            confidence_band: None,
        }
    }

    pub fn with_band(mut self, low: f64, high: f64) -> Self {
        self.confidence_band = Some((low, high));
        self
    }
}

/// Forecast from one independent producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub subject_key: SubjectKey,
    pub source: ForecastSource,
    pub points: Vec<ForecastPoint>,
}

impl ForecastSet {
    pub fn new(subject_key: SubjectKey, source: ForecastSource, points: Vec<ForecastPoint>) -> Self {
        Self {
            subject_key,
            source,
            points,
        }
    }

    pub fn point(&self, horizon: Horizon) -> Option<&ForecastPoint> {
        self.points.iter().find(|p| p.horizon == horizon)
    }
}

// ============================================================================
// BLENDED FORECAST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedPoint {
    pub horizon: Horizon,
    pub price: f64,
    pub numeric_price: f64,
    /// Narrative estimate after clamping, if one was found.
    pub narrative_price: Option<f64>,
    pub clamped: bool,
    /// Relative move the narrative applied to the numeric price.
    pub adjustment: f64,
    pub confidence_band: Option<(f64, f64)>,
    /// Percentage change against the current price, when known.
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedForecast {
    pub subject_key: SubjectKey,
    pub points: Vec<BlendedPoint>,
    pub weights: BlendWeights,
    pub current_price: Option<f64>,
    pub generated_at: Timestamp,
}

impl BlendedForecast {
    pub fn point(&self, horizon: Horizon) -> Option<&BlendedPoint> {
        self.points.iter().find(|p| p.horizon == horizon)
    }
}
