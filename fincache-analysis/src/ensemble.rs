//! Weighted ensemble over three numeric price models.
//!
//! Each model predicts a daily series of the same length. The ensemble price
//! for a day is the weighted sum of the three predictions, and its band is
//! 1.5 population standard deviations of the model spread on either side.
//!
//! [`Ensemble::report`] adds the chart series (recent closes, the current
//! price, then the predicted days), per-model series and technical signals.

use fincache_core::{
    EnsembleWeights, FincacheResult, ForecastPoint, ForecastSet, ForecastSource, Horizon,
    SubjectKey, ValidationError,
};
use serde::{Deserialize, Serialize};

use crate::round2;
use crate::signals::TechnicalSignals;

const BAND_WIDTH_STDS: f64 = 1.5;

/// Fewest daily closes a report is built from.
pub const MIN_DAILY_HISTORY: usize = 30;
/// Historical closes shown ahead of the current price in chart data.
pub const CHART_HISTORY_DAYS: usize = 30;

/// Per-model daily prediction series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPredictions {
    pub lstm: Vec<f64>,
    pub random_forest: Vec<f64>,
    pub linear: Vec<f64>,
}

impl ModelPredictions {
    pub fn days(&self) -> usize {
        self.lstm.len()
    }

    /// Each series rounded to 2dp.
    pub fn rounded(&self) -> Self {
        let round = |series: &Vec<f64>| series.iter().map(|v| round2(*v)).collect();
        Self {
            lstm: round(&self.lstm),
            random_forest: round(&self.random_forest),
            linear: round(&self.linear),
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        let days = self.days();
        if days == 0 {
            return Err(ValidationError::RequiredFieldMissing {
                field: "predictions.lstm".to_string(),
            });
        }
        for (name, series) in [
            ("predictions.random_forest", &self.random_forest),
            ("predictions.linear", &self.linear),
        ] {
            if series.len() != days {
                return Err(ValidationError::ConstraintViolation {
                    constraint: "equal_series_length".to_string(),
                    reason: format!("{name} has {} days, expected {days}", series.len()),
                });
            }
        }
        let all = self.lstm.iter().chain(&self.random_forest).chain(&self.linear);
        if let Some(bad) = all.copied().find(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidValue {
                field: "predictions".to_string(),
                reason: format!("{bad} is not a finite price"),
            });
        }
        Ok(())
    }
}

/// One day of the combined series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDay {
    pub price: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartPointKind {
    Historical,
    Current,
    Predicted,
}

/// One chart entry. Day 0 is the current price, negative days are past closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub day: i32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(rename = "type")]
    pub kind: ChartPointKind,
}

/// Ensemble price at a summary horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonSummary {
    pub horizon: Horizon,
    pub price: f64,
    pub change_pct: f64,
    /// `[lower, upper]`
    pub confidence: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleReport {
    pub subject_key: SubjectKey,
    pub current_price: f64,
    pub chart_data: Vec<ChartPoint>,
    pub predictions: Vec<HorizonSummary>,
    pub model_weights: EnsembleWeights,
    pub model_predictions: ModelPredictions,
    pub technical_signals: TechnicalSignals,
}

impl EnsembleReport {
    pub fn prediction(&self, horizon: Horizon) -> Option<&HorizonSummary> {
        self.predictions.iter().find(|p| p.horizon == horizon)
    }
}

fn check_history(history: &[f64], current_price: f64) -> Result<(), ValidationError> {
    if history.len() < MIN_DAILY_HISTORY {
        return Err(ValidationError::ConstraintViolation {
            constraint: "min_daily_history".to_string(),
            reason: format!(
                "need at least {MIN_DAILY_HISTORY} historical prices, got {}",
                history.len()
            ),
        });
    }
    if let Some(bad) = history.iter().find(|v| !v.is_finite()) {
        return Err(ValidationError::InvalidValue {
            field: "historical_prices".to_string(),
            reason: format!("{bad} is not a finite price"),
        });
    }
    if !current_price.is_finite() || current_price == 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "current_price".to_string(),
            reason: format!("{current_price} is not a usable price"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct Ensemble {
    weights: EnsembleWeights,
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

impl Ensemble {
    pub fn new(weights: EnsembleWeights) -> FincacheResult<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Combined price and band for every predicted day.
    pub fn daily(&self, predictions: &ModelPredictions) -> FincacheResult<Vec<EnsembleDay>> {
        predictions.check()?;
        let w = &self.weights;
        Ok(predictions
            .lstm
            .iter()
            .zip(&predictions.random_forest)
            .zip(&predictions.linear)
            .map(|((&lstm, &rf), &linear)| {
                let weighted = w.lstm * lstm + w.random_forest * rf + w.linear * linear;
                let spread = BAND_WIDTH_STDS * population_std(&[lstm, rf, linear]);
                EnsembleDay {
                    price: round2(weighted),
                    lower: round2(weighted - spread),
                    upper: round2(weighted + spread),
                }
            })
            .collect())
    }

    /// Numeric forecast at the summary horizons the series is long enough for.
    pub fn forecast(
        &self,
        subject: SubjectKey,
        predictions: &ModelPredictions,
    ) -> FincacheResult<ForecastSet> {
        let daily = self.daily(predictions)?;
        let points = Horizon::SUMMARY
            .iter()
            .filter_map(|h| {
                let day = daily.get(h.day_index()?)?;
                Some(ForecastPoint::new(*h, day.price).with_band(day.lower, day.upper))
            })
            .collect();
        Ok(ForecastSet::new(subject, ForecastSource::Numeric, points))
    }

    /// Full report for `history` (daily closes, oldest first) and the model
    /// series predicted from it.
    ///
    /// # Errors
    /// * `ValidationError::ConstraintViolation` - fewer than [`MIN_DAILY_HISTORY`] closes
    /// * `ValidationError::InvalidValue` - a close or the current price is unusable
    pub fn report(
        &self,
        subject: SubjectKey,
        history: &[f64],
        current_price: f64,
        predictions: &ModelPredictions,
    ) -> FincacheResult<EnsembleReport> {
        check_history(history, current_price)?;
        let daily = self.daily(predictions)?;

        let recent = &history[history.len() - CHART_HISTORY_DAYS..];
        let mut chart_data = Vec::with_capacity(recent.len() + 1 + daily.len());
        chart_data.extend(recent.iter().zip(-(recent.len() as i32)..).map(|(&price, day)| {
            ChartPoint {
                day,
                price: round2(price),
                upper: None,
                lower: None,
                kind: ChartPointKind::Historical,
            }
        }));
        chart_data.push(ChartPoint {
            day: 0,
            price: round2(current_price),
            upper: None,
            lower: None,
            kind: ChartPointKind::Current,
        });
        chart_data.extend(daily.iter().zip(1..).map(|(d, day)| ChartPoint {
            day,
            price: d.price,
            upper: Some(d.upper),
            lower: Some(d.lower),
            kind: ChartPointKind::Predicted,
        }));

        let summaries = Horizon::SUMMARY
            .iter()
            .filter_map(|h| {
                let d = daily.get(h.day_index()?)?;
                Some(HorizonSummary {
                    horizon: *h,
                    price: d.price,
                    change_pct: round2((d.price - current_price) / current_price * 100.0),
                    confidence: (d.lower, d.upper),
                })
            })
            .collect();

        Ok(EnsembleReport {
            subject_key: subject,
            current_price,
            chart_data,
            predictions: summaries,
            model_weights: self.weights,
            model_predictions: predictions.rounded(),
            technical_signals: TechnicalSignals::from_prices(history),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
