//! Blends a numeric forecast with an optional narrative one.
//!
//! For every numeric horizon the narrative estimate is looked up through
//! [`Horizon::narrative_candidates`], clamped into the numeric confidence band
//! and mixed in with the configured weights. A missing or unusable narrative
//! leaves the numeric price untouched.

use fincache_core::{
    BlendWeights, BlendedForecast, BlendedPoint, FincacheResult, ForecastPoint, ForecastSet,
    Timestamp, ValidationError,
};

use crate::round2;

#[derive(Debug, Clone, Default)]
pub struct PredictionCompositor {
    weights: BlendWeights,
}

impl PredictionCompositor {
    /// Create a compositor, rejecting weights that do not sum to one.
    pub fn new(weights: BlendWeights) -> FincacheResult<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> BlendWeights {
        self.weights
    }

    /// Blend `numeric` with `narrative`.
    ///
    /// # Errors
    /// * `ValidationError::SubjectMismatch` - narrative is about a different subject
    /// * `ValidationError::InvalidValue` - a numeric price or band bound is not finite
    pub fn compose(
        &self,
        numeric: &ForecastSet,
        narrative: Option<&ForecastSet>,
        current_price: Option<f64>,
        generated_at: Timestamp,
    ) -> FincacheResult<BlendedForecast> {
        if let Some(narrative) = narrative {
            if narrative.subject_key != numeric.subject_key {
                return Err(ValidationError::SubjectMismatch {
                    expected: numeric.subject_key.to_string(),
                    got: narrative.subject_key.to_string(),
                }
                .into());
            }
        }

        let current_price = current_price.filter(|p| p.is_finite() && *p != 0.0);
        let points = numeric
            .points
            .iter()
            .map(|point| self.blend_point(point, narrative, current_price))
            .collect::<FincacheResult<Vec<_>>>()?;

        Ok(BlendedForecast {
            subject_key: numeric.subject_key.clone(),
            points,
            weights: self.weights,
            current_price,
            generated_at,
        })
    }

    fn blend_point(
        &self,
        point: &ForecastPoint,
        narrative: Option<&ForecastSet>,
        current_price: Option<f64>,
    ) -> FincacheResult<BlendedPoint> {
        let numeric_price = point.price;
        if !numeric_price.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: format!("numeric.{}", point.horizon),
                reason: format!("price {numeric_price} is not finite"),
            }
            .into());
        }

        if let Some((low, high)) = point.confidence_band {
            if !(low.is_finite() && high.is_finite()) {
                return Err(ValidationError::InvalidValue {
                    field: format!("numeric.{}.confidence_band", point.horizon),
                    reason: format!("band ({low}, {high}) has a non-finite bound"),
                }
                .into());
            }
        }
        let band = point.confidence_band.map(|(a, b)| if a > b { (b, a) } else { (a, b) });
        let raw_narrative = narrative.and_then(|set| {
            point
                .horizon
                .narrative_candidates()
                .iter()
                .find_map(|h| set.point(*h))
                .map(|p| p.price)
                .filter(|p| p.is_finite())
        });
        let narrative_price =
            raw_narrative.map(|n| band.map_or(n, |(low, high)| n.clamp(low, high)));
        let clamped = raw_narrative != narrative_price;

        let (price, adjustment) = match narrative_price {
            Some(estimate) => {
                let price =
                    self.weights.numeric * numeric_price + self.weights.narrative * estimate;
                let adjustment = if numeric_price == 0.0 {
                    0.0
                } else {
                    (estimate - numeric_price) / numeric_price * self.weights.narrative
                };
                (price, adjustment)
            }
            None => (numeric_price, 0.0),
        };

        Ok(BlendedPoint {
            horizon: point.horizon,
            price,
            numeric_price,
            narrative_price,
            clamped,
            adjustment,
            confidence_band: band,
            change_pct: current_price.map(|current| round2((price - current) / current * 100.0)),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::Utc;
    use fincache_core::{ForecastSource, Horizon, SubjectKey};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A blended price never leaves the numeric band.
        #[test]
        fn prop_blend_stays_in_band(
            center in 1.0f64..10_000.0,
            spread in 0.0f64..500.0,
            estimate in -20_000.0f64..20_000.0,
            numeric_weight in 0.0f64..=1.0,
        ) {
            let weights = BlendWeights { numeric: numeric_weight, narrative: 1.0 - numeric_weight };
            let compositor = PredictionCompositor::new(weights).unwrap();
            let subject = SubjectKey::new("TCS").unwrap();
            let low = center - spread;
            let high = center + spread;
            let numeric = ForecastSet::new(
                subject.clone(),
                ForecastSource::Numeric,
                vec![ForecastPoint::new(Horizon::Day10, center).with_band(low, high)],
            );
            let narrative = ForecastSet::new(
                subject,
                ForecastSource::Narrative,
                vec![ForecastPoint::new(Horizon::Week1, estimate)],
            );
            let blended = compositor.compose(&numeric, Some(&narrative), None, Utc::now()).unwrap();
            let price = blended.points[0].price;
            prop_assert!(price >= low - 1e-6 && price <= high + 1e-6);
        }
    }
}
