//! FINCACHE Test Utilities
//!
//! Proptest generators, mock collaborators, fixtures and assertions shared
//! by the workspace's tests.

// Re-export the in-memory store from its source crate
pub use fincache_storage::InMemoryDocumentStore;

// Re-export core types for convenience
pub use fincache_core::{
    CacheDurations, Clock, DataQuality, DocumentClass, FinancialStatement, FincacheError,
    FincacheResult, FiscalPeriod, ForecastPoint, ForecastSet, ForecastSource, Horizon, LlmError,
    ProbeError, RecoveryError, StorageError, SubjectKey, Timestamp, ValidationError,
    ValidationWarning, ValuePair, VersionedDocument,
};
pub use fincache_llm::LatestVersions;

use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Clock starting at 2025-04-01T00:00:00Z.
    pub fn start_of_fiscal_year() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).single().unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += step;
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::start_of_fiscal_year()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install an env-filtered subscriber writing to the test harness.
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fincache=debug,warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

pub mod mocks {
    use super::*;
    use async_trait::async_trait;
    use fincache_core::UpsertOutcome;
    use fincache_llm::{GenerationContext, Generator, VersionProbe};
    use fincache_storage::DocumentStore;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// One recorded generator invocation.
    #[derive(Debug, Clone)]
    pub struct GenerationCall {
        pub class: DocumentClass,
        pub subject: SubjectKey,
        pub context: GenerationContext,
    }

    #[derive(Debug, Default)]
    struct Script {
        queued: HashMap<DocumentClass, VecDeque<Result<String, LlmError>>>,
        standing: HashMap<DocumentClass, Result<String, LlmError>>,
        calls: Vec<GenerationCall>,
    }

    /// Generator returning scripted raw output per class.
    ///
    /// Queued responses are used once, in order; after that the standing
    /// response for the class applies. With neither, the call fails.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedGenerator {
        script: Arc<Mutex<Script>>,
        delay: Option<Duration>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        fn script(&self) -> std::sync::MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(|p| p.into_inner())
        }

        /// Always answer `class` with `raw`.
        pub fn with_response(self, class: DocumentClass, raw: impl Into<String>) -> Self {
            self.script().standing.insert(class, Ok(raw.into()));
            self
        }

        /// Always fail `class` with `error`.
        pub fn with_failure(self, class: DocumentClass, error: LlmError) -> Self {
            self.script().standing.insert(class, Err(error));
            self
        }

        /// Answer the next call for `class` with `response`.
        pub fn push(&self, class: DocumentClass, response: Result<String, LlmError>) {
            self.script().queued.entry(class).or_default().push_back(response);
        }

        /// Sleep this long inside every call.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.script().calls.len()
        }

        /// Classes in the order they were requested.
        pub fn calls(&self) -> Vec<DocumentClass> {
            self.script().calls.iter().map(|c| c.class).collect()
        }

        pub fn calls_for(&self, class: DocumentClass) -> usize {
            self.script().calls.iter().filter(|c| c.class == class).count()
        }

        pub fn recorded(&self) -> Vec<GenerationCall> {
            self.script().calls.clone()
        }

        /// Highest number of calls observed running at once.
        pub fn max_concurrency(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            class: DocumentClass,
            subject: &SubjectKey,
            context: &GenerationContext,
        ) -> Result<String, LlmError> {
            let response = {
                let mut script = self.script();
                script.calls.push(GenerationCall {
                    class,
                    subject: subject.clone(),
                    context: context.clone(),
                });
                script
                    .queued
                    .get_mut(&class)
                    .and_then(VecDeque::pop_front)
                    .or_else(|| script.standing.get(&class).cloned())
            };

            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            response.unwrap_or_else(|| {
                Err(LlmError::GenerationFailed {
                    class,
                    reason: "no scripted response".to_string(),
                })
            })
        }
    }

    /// Probe returning fixed latest versions.
    #[derive(Debug, Clone, Default)]
    pub struct StaticProbe {
        latest: LatestVersions,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl StaticProbe {
        pub fn new(latest: LatestVersions) -> Self {
            Self {
                latest,
                ..Self::default()
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
    impl VersionProbe for StaticProbe {
        async fn latest_versions(&self, _subject: &SubjectKey) -> Result<LatestVersions, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.latest.clone())
        }
    }

    /// Probe that always fails.
    #[derive(Debug, Clone)]
    pub struct FailingProbe {
        error: ProbeError,
    }

    impl FailingProbe {
        pub fn new(error: ProbeError) -> Self {
            Self { error }
        }

        pub fn unavailable() -> Self {
            Self::new(ProbeError::Unavailable {
                reason: "scraper offline".to_string(),
            })
        }
    }

    #[async_trait]
    impl VersionProbe for FailingProbe {
        async fn latest_versions(&self, _subject: &SubjectKey) -> Result<LatestVersions, ProbeError> {
            Err(self.error.clone())
        }
    }

    /// In-memory store whose reads and writes can be made to fail or stall.
    #[derive(Debug, Clone, Default)]
    pub struct FlakyStore {
        inner: InMemoryDocumentStore,
        fail_reads: Arc<AtomicBool>,
        fail_writes: Arc<AtomicBool>,
        delay: Option<Duration>,
        upserts: Arc<AtomicUsize>,
    }

    impl FlakyStore {
        pub fn new(inner: InMemoryDocumentStore) -> Self {
            Self {
                inner,
                ..Self::default()
            }
        }

        pub fn inner(&self) -> &InMemoryDocumentStore {
            &self.inner
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Stall every operation this long.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Upsert attempts, failed ones included.
        pub fn upsert_count(&self) -> usize {
            self.upserts.load(Ordering::SeqCst)
        }

        async fn stall(&self) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn upsert(&self, document: &VersionedDocument) -> FincacheResult<UpsertOutcome> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.stall().await;
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::PersistenceFailed {
                    subject: document.subject_key.to_string(),
                    class: document.document_class,
                    reason: "disk full".to_string(),
                }
                .into());
            }
            self.inner.upsert(document).await
        }

        async fn find_latest(
            &self,
            subject: &SubjectKey,
            class: DocumentClass,
            not_expired_as_of: Timestamp,
        ) -> FincacheResult<Option<VersionedDocument>> {
            self.stall().await;
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::ReadFailed {
                    subject: subject.to_string(),
                    class,
                    reason: "connection reset".to_string(),
                }
                .into());
            }
            self.inner.find_latest(subject, class, not_expired_as_of).await
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_subject_key() -> impl Strategy<Value = SubjectKey> {
        "[A-Za-z][A-Za-z0-9&]{0,11}".prop_filter_map("valid subject", |s| SubjectKey::new(s).ok())
    }

    pub fn arb_document_class() -> impl Strategy<Value = DocumentClass> {
        prop_oneof![
            Just(DocumentClass::Annual),
            Just(DocumentClass::Quarterly),
            Just(DocumentClass::EarningsCall),
        ]
    }

    pub fn arb_fiscal_period() -> impl Strategy<Value = FiscalPeriod> {
        (2000u16..2100, proptest::option::of(1u8..=4)).prop_map(|(year, quarter)| FiscalPeriod {
            year,
            quarter,
        })
    }

    /// A label for `period` in one of the spellings upstream produces.
    pub fn arb_label_for(period: FiscalPeriod) -> impl Strategy<Value = String> {
        let short_year = period.year % 100;
        let years = vec![format!("{}", period.year), format!("{:02}", short_year)];
        (proptest::sample::select(years), 0usize..4, any::<bool>()).prop_map(
            move |(year, sep, lower)| {
                let sep = ["", " ", "-", "_"][sep];
                let label = match period.quarter {
                    Some(q) => format!("Q{q}{sep}FY{year}"),
                    None => format!("FY{sep}{year}"),
                };
                if lower {
                    label.to_lowercase()
                } else {
                    label
                }
            },
        )
    }

    pub fn arb_period_and_label() -> impl Strategy<Value = (FiscalPeriod, String)> {
        arb_fiscal_period().prop_flat_map(|period| (Just(period), arb_label_for(period)))
    }

    pub fn arb_value_pair() -> impl Strategy<Value = ValuePair> {
        (
            proptest::option::of(-1e9f64..1e9),
            proptest::option::of(-1e9f64..1e9),
        )
            .prop_map(|(current, previous)| ValuePair { current, previous })
    }

    pub fn arb_statement() -> impl Strategy<Value = FinancialStatement> {
        (
            arb_value_pair(),
            arb_value_pair(),
            arb_value_pair(),
            arb_value_pair(),
            arb_value_pair(),
        )
            .prop_map(|(assets, equity, liabilities, revenue, profit)| FinancialStatement {
                total_assets: assets,
                total_equity: equity,
                total_liabilities: liabilities,
                revenue,
                net_profit: profit,
            })
    }

    /// Integer-valued statement satisfying `assets = equity + liabilities`.
    pub fn arb_balanced_statement() -> impl Strategy<Value = FinancialStatement> {
        (1_000i64..10_000_000, 1i64..99).prop_map(|(assets, equity_pct)| {
            let equity = assets * equity_pct / 100;
            FinancialStatement {
                total_assets: ValuePair::current(assets as f64),
                total_equity: ValuePair::current(equity as f64),
                total_liabilities: ValuePair::current((assets - equity) as f64),
                ..Default::default()
            }
        })
    }

    pub fn arb_price() -> impl Strategy<Value = f64> {
        1.0f64..100_000.0
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use fincache_analysis::ModelPredictions;
    use serde_json::{json, Value};

    pub fn subject() -> SubjectKey {
        subject_named("TCS")
    }

    pub fn subject_named(raw: &str) -> SubjectKey {
        SubjectKey::new(raw).unwrap_or_else(|e| panic!("bad fixture subject {raw}: {e}"))
    }

    pub fn latest(annual: &str, quarterly: &str, earnings_call: &str) -> LatestVersions {
        LatestVersions {
            annual: Some(annual.to_string()),
            quarterly: Some(quarterly.to_string()),
            earnings_call: Some(earnings_call.to_string()),
        }
    }

    pub fn statement(assets: f64, equity: f64, liabilities: f64) -> FinancialStatement {
        FinancialStatement {
            total_assets: ValuePair::current(assets),
            total_equity: ValuePair::current(equity),
            total_liabilities: ValuePair::current(liabilities),
            ..Default::default()
        }
    }

    fn financials_json(statement: &FinancialStatement) -> String {
        serde_json::to_string(statement).unwrap_or_else(|e| panic!("fixture statement: {e}"))
    }

    /// Complete annual generator output.
    pub fn annual_raw(label: &str, statement: &FinancialStatement) -> String {
        format!(
            r#"{{"fiscalYear":"{label}","financials":{},"highlights":["Record deal wins"],"risks":["Currency exposure","Client concentration"],"outlook":"Stable demand"}}"#,
            financials_json(statement)
        )
    }

    /// Complete quarterly generator output.
    pub fn quarterly_raw(label: &str, statement: &FinancialStatement) -> String {
        format!(
            r#"{{"quarter":"{label}","financials":{},"opportunities":["Cloud migration","GenAI services"],"guidance":"Margin band 24-26%"}}"#,
            financials_json(statement)
        )
    }

    /// Complete earnings-call generator output.
    pub fn earnings_call_raw(label: &str) -> String {
        format!(
            r#"{{"quarter":"{label}","tone":"cautiously optimistic","keyTakeaways":["Deal pipeline healthy","Attrition down"],"qa":[{{"q":"Pricing?","a":"Stable"}}]}}"#
        )
    }

    /// Generator output for `class` with a balanced default statement.
    pub fn raw_for(class: DocumentClass, label: &str) -> String {
        let balanced = statement(124936.0, 87332.0, 37604.0);
        match class {
            DocumentClass::Annual => annual_raw(label, &balanced),
            DocumentClass::Quarterly => quarterly_raw(label, &balanced),
            DocumentClass::EarningsCall => earnings_call_raw(label),
        }
    }

    /// Drop the last `bytes` bytes, simulating a truncated response.
    /// Fixture payloads are ASCII, so any cut is a char boundary.
    pub fn truncate_tail(raw: &str, bytes: usize) -> String {
        raw[..raw.len().saturating_sub(bytes)].to_string()
    }

    /// Annual output cut off inside the field after the safe cut field.
    pub fn truncated_annual_raw(label: &str, statement: &FinancialStatement) -> String {
        truncate_tail(&annual_raw(label, statement), 8)
    }

    pub fn annual_payload(label: &str, statement: &FinancialStatement) -> Value {
        let mut payload = json!({
            "fiscalYear": label,
            "risks": ["Currency exposure"],
        });
        statement.write_into(&mut payload, "financials");
        payload
    }

    /// A stored document fetched at `fetched_at` with the default window.
    pub fn document(
        subject: &SubjectKey,
        class: DocumentClass,
        label: &str,
        fetched_at: Timestamp,
    ) -> VersionedDocument {
        let payload = match class {
            DocumentClass::EarningsCall => json!({"quarter": label, "keyTakeaways": ["steady"]}),
            DocumentClass::Quarterly => json!({"quarter": label, "opportunities": []}),
            DocumentClass::Annual => annual_payload(label, &statement(124936.0, 87332.0, 37604.0)),
        };
        VersionedDocument::new(
            subject.clone(),
            class,
            label,
            payload,
            fetched_at,
            CacheDurations::default().duration_for(class),
            DataQuality::clean(),
        )
    }

    /// Store holding one document per class.
    pub async fn seeded_store(
        subject: &SubjectKey,
        labels: [&str; 3],
        fetched_at: Timestamp,
    ) -> InMemoryDocumentStore {
        use fincache_storage::DocumentStore;
        let store = InMemoryDocumentStore::new();
        for (class, label) in DocumentClass::ALL.into_iter().zip(labels) {
            let doc = document(subject, class, label, fetched_at);
            if let Err(e) = store.upsert(&doc).await {
                panic!("seeding {class} failed: {e}");
            }
        }
        store
    }

    pub fn numeric_set(subject: &SubjectKey, points: &[(Horizon, f64, f64, f64)]) -> ForecastSet {
        ForecastSet::new(
            subject.clone(),
            ForecastSource::Numeric,
            points
                .iter()
                .map(|(h, price, low, high)| ForecastPoint::new(*h, *price).with_band(*low, *high))
                .collect(),
        )
    }

    pub fn narrative_set(subject: &SubjectKey, points: &[(Horizon, f64)]) -> ForecastSet {
        ForecastSet::new(
            subject.clone(),
            ForecastSource::Narrative,
            points.iter().map(|(h, price)| ForecastPoint::new(*h, *price)).collect(),
        )
    }

    /// Three model series drifting up from `base` by `step` per day.
    pub fn model_predictions(days: usize, base: f64, step: f64) -> ModelPredictions {
        let series = |offset: f64| -> Vec<f64> {
            (0..days).map(|d| base + offset + step * d as f64).collect()
        };
        ModelPredictions {
            lstm: series(0.0),
            random_forest: series(2.0),
            linear: series(-2.0),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &FincacheResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &FincacheResult<T>) {
        assert!(result.is_err(), "Expected Err, got {:?}", result);
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &FincacheResult<T>) {
        assert!(
            matches!(result, Err(FincacheError::Validation(_))),
            "Expected ValidationError, got {:?}",
            result
        );
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &FincacheResult<T>) {
        assert!(
            matches!(result, Err(FincacheError::Config(_))),
            "Expected ConfigError, got {:?}",
            result
        );
    }

    #[track_caller]
    pub fn assert_llm_error<T: std::fmt::Debug>(result: &FincacheResult<T>) {
        assert!(
            matches!(result, Err(FincacheError::Llm(_))),
            "Expected LlmError, got {:?}",
            result
        );
    }

    #[track_caller]
    pub fn assert_recovery_error<T: std::fmt::Debug>(result: &Result<T, RecoveryError>) {
        assert!(result.is_err(), "Expected RecoveryError, got {:?}", result);
    }

    #[track_caller]
    pub fn assert_has_warning(quality: &DataQuality, code: &str) {
        assert!(
            quality.warnings.iter().any(|w| w.code() == code),
            "Expected warning '{}', got {:?}",
            code,
            quality.warnings
        );
    }

    #[track_caller]
    pub fn assert_no_warning(quality: &DataQuality, code: &str) {
        assert!(
            !quality.warnings.iter().any(|w| w.code() == code),
            "Unexpected warning '{}' in {:?}",
            code,
            quality.warnings
        );
    }

    #[track_caller]
    pub fn assert_label(document: &VersionedDocument, expected: &str) {
        assert_eq!(
            document.version_label, expected,
            "Expected version label {}, got {}",
            expected, document.version_label
        );
    }

    #[track_caller]
    pub fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "Expected {} to be within 1e-6 of {}",
            actual,
            expected
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
