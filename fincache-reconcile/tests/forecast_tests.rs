//! Prediction service behavior: blending, degradation and caching.

mod support;

use fincache_analysis::Ensemble;
use fincache_core::{ForecastConfig, ForecastSource, Horizon};
use fincache_reconcile::{EnsembleForecaster, ForecastProvider, PredictionService};
use fincache_test_utils::assertions::*;
use fincache_test_utils::fixtures::*;
use fincache_test_utils::{init_test_tracing, ManualClock};
use std::sync::Arc;
use std::time::Duration;
use support::{FixedModels, StaticForecast, StaticPriceFeed};

fn numeric() -> Arc<StaticForecast> {
    Arc::new(StaticForecast::new(numeric_set(
        &subject(),
        &[(Horizon::Day1, 100.0, 95.0, 110.0), (Horizon::Day5, 102.0, 96.0, 108.0)],
    )))
}

fn narrative() -> Arc<StaticForecast> {
    Arc::new(StaticForecast::new(narrative_set(
        &subject(),
        &[(Horizon::Day1, 110.0), (Horizon::Week1, 130.0)],
    )))
}

fn service(
    numeric: Arc<StaticForecast>,
    prices: Arc<StaticPriceFeed>,
    clock: ManualClock,
) -> PredictionService<ManualClock> {
    PredictionService::with_clock(numeric, prices, ForecastConfig::default(), clock)
        .expect("default forecast config is valid")
}

#[tokio::test]
async fn blends_and_reports_change_against_current_price() {
    init_test_tracing();
    let svc = service(numeric(), Arc::new(StaticPriceFeed::new(100.0)), ManualClock::default())
        .with_narrative(narrative());

    let prediction = svc.predict(&subject()).await.unwrap();
    assert!(!prediction.cached);

    let day1 = prediction.forecast.point(Horizon::Day1).unwrap();
    assert_close(day1.price, 103.0);
    assert_eq!(day1.narrative_price, Some(110.0));
    assert!(!day1.clamped);
    assert_eq!(day1.change_pct, Some(3.0));

    // Day5 falls back to the weekly estimate, clamped to the band.
    let day5 = prediction.forecast.point(Horizon::Day5).unwrap();
    assert!(day5.clamped);
    assert_eq!(day5.narrative_price, Some(108.0));
    assert_close(day5.price, 0.7 * 102.0 + 0.3 * 108.0);
    assert_eq!(prediction.forecast.current_price, Some(100.0));
}

#[tokio::test]
async fn second_call_is_served_from_cache_until_expiry() {
    let clock = ManualClock::default();
    let provider = numeric();
    let svc = service(provider.clone(), Arc::new(StaticPriceFeed::new(100.0)), clock.clone());

    let first = svc.predict(&subject()).await.unwrap();
    let second = svc.predict(&subject()).await.unwrap();
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.forecast, second.forecast);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(svc.cached_predictions(), 1);

    clock.advance(Duration::from_secs(25 * 60 * 60));
    let third = svc.predict(&subject()).await.unwrap();
    assert!(!third.cached);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn invalidate_forces_recompute() {
    let provider = numeric();
    let svc = service(provider.clone(), Arc::new(StaticPriceFeed::new(100.0)), ManualClock::default());

    svc.predict(&subject()).await.unwrap();
    assert!(svc.invalidate(&subject()));
    assert!(!svc.predict(&subject()).await.unwrap().cached);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn narrative_failure_passes_numeric_through() {
    init_test_tracing();
    let svc = service(numeric(), Arc::new(StaticPriceFeed::new(100.0)), ManualClock::default())
        .with_narrative(Arc::new(StaticForecast::failing(ForecastSource::Narrative)));

    let prediction = svc.predict(&subject()).await.unwrap();

    for point in &prediction.forecast.points {
        assert_eq!(point.price, point.numeric_price);
        assert!(point.narrative_price.is_none());
        assert_eq!(point.adjustment, 0.0);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_narrative_times_out_to_numeric_only() {
    let slow = Arc::new(
        StaticForecast::new(narrative_set(&subject(), &[(Horizon::Day1, 110.0)]))
            .with_delay(Duration::from_secs(120)),
    );
    let svc = service(numeric(), Arc::new(StaticPriceFeed::new(100.0)), ManualClock::default())
        .with_narrative(slow.clone());

    let prediction = svc.predict(&subject()).await.unwrap();

    assert_eq!(slow.call_count(), 1);
    assert_close(prediction.forecast.point(Horizon::Day1).unwrap().price, 100.0);
}

#[tokio::test]
async fn numeric_failure_is_an_error() {
    let svc = service(
        Arc::new(StaticForecast::failing(ForecastSource::Numeric)),
        Arc::new(StaticPriceFeed::new(100.0)),
        ManualClock::default(),
    )
    .with_narrative(narrative());

    let result = svc.predict(&subject()).await;

    assert_err(&result);
    assert!(result.unwrap_err().to_string().contains("numeric"));
    assert_eq!(svc.cached_predictions(), 0);
}

#[tokio::test]
async fn numeric_set_for_other_subject_is_rejected() {
    let other = Arc::new(StaticForecast::new(numeric_set(
        &subject_named("INFY"),
        &[(Horizon::Day1, 100.0, 95.0, 110.0)],
    )));
    let svc = service(other, Arc::new(StaticPriceFeed::new(100.0)), ManualClock::default());

    assert_validation_error(&svc.predict(&subject()).await);
}

#[tokio::test]
async fn missing_price_omits_change() {
    let svc = service(numeric(), Arc::new(StaticPriceFeed::failing()), ManualClock::default());

    let prediction = svc.predict(&subject()).await.unwrap();

    assert!(prediction.forecast.current_price.is_none());
    assert!(prediction.forecast.points.iter().all(|p| p.change_pct.is_none()));
}

#[tokio::test]
async fn current_price_is_cached_for_price_window() {
    let clock = ManualClock::default();
    let feed = Arc::new(StaticPriceFeed::new(250.5));
    let svc = service(numeric(), feed.clone(), clock.clone());

    assert_eq!(svc.current_price(&subject()).await, Some(250.5));
    assert_eq!(svc.current_price(&subject()).await, Some(250.5));
    assert_eq!(feed.call_count(), 1);

    clock.advance(Duration::from_secs(6 * 60));
    svc.current_price(&subject()).await;
    assert_eq!(feed.call_count(), 2);
}

#[tokio::test]
async fn failed_price_is_not_cached() {
    let feed = Arc::new(StaticPriceFeed::failing());
    let svc = service(numeric(), feed.clone(), ManualClock::default());

    assert!(svc.current_price(&subject()).await.is_none());
    assert!(svc.current_price(&subject()).await.is_none());
    assert_eq!(feed.call_count(), 2);
}

#[tokio::test]
async fn ensemble_forecaster_reports_summary_horizons() {
    let forecaster = EnsembleForecaster::new(
        FixedModels(model_predictions(30, 100.0, 1.0)),
        Ensemble::default(),
    );

    let set = forecaster.forecast(&subject()).await.unwrap();

    assert_eq!(set.source, ForecastSource::Numeric);
    let horizons: Vec<Horizon> = set.points.iter().map(|p| p.horizon).collect();
    assert_eq!(horizons, Horizon::SUMMARY.to_vec());
    assert_close(set.points[0].price, 100.2);
    assert_close(set.points[3].price, 129.2);
    for point in &set.points {
        let (low, high) = point.confidence_band.unwrap();
        assert!(low < point.price && point.price < high);
    }
}

#[tokio::test]
async fn ensemble_forecaster_feeds_prediction_service() {
    let forecaster = Arc::new(EnsembleForecaster::new(
        FixedModels(model_predictions(30, 100.0, 1.0)),
        Ensemble::default(),
    ));
    let svc = PredictionService::with_clock(
        forecaster,
        Arc::new(StaticPriceFeed::new(100.0)),
        ForecastConfig::default(),
        ManualClock::default(),
    )
    .unwrap();

    let prediction = svc.predict(&subject()).await.unwrap();

    assert_eq!(prediction.forecast.points.len(), 4);
    assert_eq!(prediction.forecast.point(Horizon::Day1).unwrap().change_pct, Some(0.2));
}

#[tokio::test]
async fn ensemble_report_charts_history_then_predictions() {
    let forecaster = EnsembleForecaster::new(
        FixedModels(model_predictions(30, 100.0, 1.0)),
        Ensemble::default(),
    );
    let history: Vec<f64> = (0..200).map(|i| 90.0 + (i % 7) as f64).collect();

    let report = forecaster.report(&subject(), &history, 100.0).await.unwrap();

    assert_eq!(report.chart_data.len(), 61);
    assert_eq!(report.chart_data.first().unwrap().day, -30);
    assert_eq!(report.chart_data.last().unwrap().day, 30);
    assert_eq!(report.model_predictions.lstm.len(), 30);
    assert_eq!(report.prediction(Horizon::Day1).unwrap().change_pct, 0.2);
}

#[tokio::test]
async fn ensemble_report_needs_a_month_of_history() {
    let forecaster = EnsembleForecaster::new(
        FixedModels(model_predictions(30, 100.0, 1.0)),
        Ensemble::default(),
    );

    assert_validation_error(&forecaster.report(&subject(), &[100.0; 12], 100.0).await);
}
