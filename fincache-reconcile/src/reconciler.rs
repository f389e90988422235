//! The reconcile request flow.
//!
//! One request reads every class from cache (falling back to the store),
//! asks the version probe what upstream has, and regenerates only the
//! classes that are missing, forced or superseded. Collaborator failures are
//! contained per class; `reconcile` always returns a full [`Bundle`].

use fincache_analysis::FinancialValidator;
use fincache_core::{
    parse_version_label, Clock, DataQuality, DocumentClass, FinancialStatement, FincacheResult,
    LlmError, ProbeError, ReconcileConfig, StorageError, SubjectKey, Timestamp, VersionedDocument,
};
use fincache_llm::{
    GenerationContext, Generator, LatestVersions, PayloadRecovery, SchemaProfile, VersionProbe,
};
use fincache_storage::{DocumentStore, FreshnessChecker, FreshnessDecision, TtlCache};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::Instrument;
use uuid::Uuid;

use crate::bundle::{Bundle, ClassOutcome, ReconcileOptions};

/// Label stored when neither the payload nor the probe names a version.
pub const UNVERSIONED_LABEL: &str = "UNVERSIONED";

/// Cache key for documents: one slot per subject and class.
pub type DocumentKey = (SubjectKey, DocumentClass);

/// In-process document cache shared across requests.
pub type DocumentCache<C = fincache_core::SystemClock> = TtlCache<DocumentKey, VersionedDocument, C>;

/// A class that needs a new document.
struct RefreshJob {
    class: DocumentClass,
    stale: Option<VersionedDocument>,
    decision: FreshnessDecision,
}

enum Plan {
    Reuse(ClassOutcome),
    Refresh(RefreshJob),
}

/// Per-request orchestrator over cache, store, probe and generator.
///
/// Time comes from the cache's clock so expiry and document stamps agree.
pub struct Reconciler<C: Clock = fincache_core::SystemClock> {
    probe: Arc<dyn VersionProbe>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn DocumentStore>,
    cache: Arc<DocumentCache<C>>,
    freshness: FreshnessChecker,
    config: ReconcileConfig,
}

impl<C: Clock> Reconciler<C> {
    /// Build a reconciler, rejecting invalid configuration.
    pub fn new(
        probe: Arc<dyn VersionProbe>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<DocumentCache<C>>,
        config: ReconcileConfig,
    ) -> FincacheResult<Self> {
        config.validate()?;
        Ok(Self {
            probe,
            generator,
            store,
            cache,
            freshness: FreshnessChecker::new(),
            config,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DocumentCache<C>> {
        &self.cache
    }

    fn now(&self) -> Timestamp {
        self.cache.clock().now()
    }

    /// Serve every document class for `subject`, regenerating what is stale.
    pub async fn reconcile(&self, subject: &SubjectKey, options: ReconcileOptions) -> Bundle {
        let request_id = Uuid::now_v7();
        let span = tracing::info_span!("reconcile", %request_id, subject = %subject);
        self.reconcile_inner(request_id, subject, options)
            .instrument(span)
            .await
    }

    async fn reconcile_inner(
        &self,
        request_id: Uuid,
        subject: &SubjectKey,
        options: ReconcileOptions,
    ) -> Bundle {
        let now = self.now();
        let (latest, annual, quarterly, earnings_call) = tokio::join!(
            self.probe_latest(subject),
            self.load_cached(subject, DocumentClass::Annual, now),
            self.load_cached(subject, DocumentClass::Quarterly, now),
            self.load_cached(subject, DocumentClass::EarningsCall, now),
        );

        let [annual, quarterly, earnings_call] = [
            (DocumentClass::Annual, annual),
            (DocumentClass::Quarterly, quarterly),
            (DocumentClass::EarningsCall, earnings_call),
        ]
        .map(|(class, cached)| self.plan(class, cached, &latest, options));
        let generation_calls = [&annual, &quarterly, &earnings_call]
            .into_iter()
            .filter(|plan| matches!(plan, Plan::Refresh(_)))
            .count();

        let (annual, quarterly, earnings_call) = if self.config.serialize_generation {
            // Enqueue order; reused classes resolve immediately.
            let annual = self.execute(subject, annual, &latest).await;
            let quarterly = self.execute(subject, quarterly, &latest).await;
            let earnings_call = self.execute(subject, earnings_call, &latest).await;
            (annual, quarterly, earnings_call)
        } else {
            tokio::join!(
                self.execute(subject, annual, &latest),
                self.execute(subject, quarterly, &latest),
                self.execute(subject, earnings_call, &latest),
            )
        };

        let bundle = Bundle {
            request_id,
            subject_key: subject.clone(),
            annual,
            quarterly,
            earnings_call,
            generation_calls,
        };

        tracing::info!(
            annual = %bundle.annual.source,
            quarterly = %bundle.quarterly.source,
            earnings_call = %bundle.earnings_call.source,
            generation_calls,
            "Reconciled subject"
        );
        bundle
    }

    fn plan(
        &self,
        class: DocumentClass,
        cached: Option<VersionedDocument>,
        latest: &LatestVersions,
        options: ReconcileOptions,
    ) -> Plan {
        let cached_label = cached.as_ref().map(|d| d.version_label.as_str());
        let decision = self
            .freshness
            .decide(cached_label, latest.get(class), options.is_forced(class));
        tracing::debug!(
            class = %class,
            cached = ?cached_label,
            latest = ?latest.get(class),
            action = ?decision.action,
            reason = ?decision.reason,
            "Freshness decision"
        );
        if decision.needs_warning() {
            tracing::warn!(
                class = %class,
                cached = ?cached_label,
                latest = ?latest.get(class),
                "Unparsable version label, reusing cached document"
            );
        }

        match cached {
            Some(document) if decision.should_reuse() => {
                Plan::Reuse(ClassOutcome::cached(document, decision))
            }
            stale => Plan::Refresh(RefreshJob {
                class,
                stale,
                decision,
            }),
        }
    }

    async fn execute(&self, subject: &SubjectKey, plan: Plan, latest: &LatestVersions) -> ClassOutcome {
        match plan {
            Plan::Reuse(outcome) => outcome,
            Plan::Refresh(job) => self.refresh(subject, job, latest).await,
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    async fn probe_latest(&self, subject: &SubjectKey) -> LatestVersions {
        let result = match timeout(self.config.probe_timeout, self.probe.latest_versions(subject)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                elapsed: self.config.probe_timeout,
            }),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Version probe unavailable, failing open to cached documents");
            LatestVersions::unavailable()
        })
    }

    async fn load_cached(
        &self,
        subject: &SubjectKey,
        class: DocumentClass,
        now: Timestamp,
    ) -> Option<VersionedDocument> {
        let key = (subject.clone(), class);
        let window = self.config.durations.duration_for(class);
        if let Some(hit) = self.cache.get_at(&key, window, now) {
            return Some(hit.value);
        }

        let lookup = self.store.find_latest(subject, class, now);
        let found = match timeout(self.config.store_timeout, lookup).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::warn!(class = %class, error = %e, "Document store read failed, treating as miss");
                None
            }
            Err(_) => {
                let e = StorageError::Timeout {
                    operation: format!("find_latest({class})"),
                    elapsed: self.config.store_timeout,
                };
                tracing::warn!(class = %class, error = %e, "Document store read timed out, treating as miss");
                None
            }
        }?;

        self.warm_cache(key, &found, "store");
        Some(found)
    }

    fn warm_cache(&self, key: DocumentKey, document: &VersionedDocument, origin: &str) {
        let mut metadata = Map::new();
        metadata.insert("origin".to_string(), json!(origin));
        metadata.insert("version_label".to_string(), json!(document.version_label));
        self.cache
            .put_at(key, document.clone(), metadata, document.fetched_at);
    }

    // ------------------------------------------------------------------------
    // Regeneration
    // ------------------------------------------------------------------------

    async fn refresh(
        &self,
        subject: &SubjectKey,
        job: RefreshJob,
        latest: &LatestVersions,
    ) -> ClassOutcome {
        let RefreshJob {
            class,
            stale,
            decision,
        } = job;
        match self.regenerate(subject, class, stale.as_ref(), latest).await {
            Ok(document) => {
                let persist_error = self.persist(&document).await;
                self.warm_cache((subject.clone(), class), &document, "generation");
                ClassOutcome::fresh(document, persist_error, decision)
            }
            Err(e) => {
                tracing::warn!(
                    class = %class,
                    error = %e,
                    has_stale = stale.is_some(),
                    "Regeneration failed"
                );
                ClassOutcome::failed(e.to_string(), stale, decision)
            }
        }
    }

    async fn regenerate(
        &self,
        subject: &SubjectKey,
        class: DocumentClass,
        stale: Option<&VersionedDocument>,
        latest: &LatestVersions,
    ) -> FincacheResult<VersionedDocument> {
        let context = GenerationContext::new(class)
            .with_latest_version(latest.get(class).map(String::from))
            .with_cached_version(stale.map(|d| d.version_label.clone()));

        let generation = self.generator.generate(class, subject, &context);
        let raw = timeout(self.config.generation_timeout, generation)
            .await
            .map_err(|_| LlmError::Timeout {
                class,
                elapsed: self.config.generation_timeout,
            })??;

        let recovered = PayloadRecovery::for_profile(context.schema).recover(&raw)?;
        let salvaged = recovered.was_salvaged();
        if salvaged {
            tracing::warn!(class = %class, outcome = ?recovered.outcome, "Generator output was truncated, salvaged prefix");
        }
        let mut payload = recovered.value;

        let quality = self.check_statement(class, context.schema, &mut payload, salvaged);
        let label = document_label(context.schema, &payload, latest.get(class));

        Ok(VersionedDocument::new(
            subject.clone(),
            class,
            label,
            payload,
            self.now(),
            self.config.durations.duration_for(class),
            quality,
        ))
    }

    /// Validate and repair the balance-sheet section in place.
    fn check_statement(
        &self,
        class: DocumentClass,
        schema: &SchemaProfile,
        payload: &mut Value,
        recovered: bool,
    ) -> DataQuality {
        let Some(field) = schema.statement_field else {
            return DataQuality {
                recovered,
                ..DataQuality::clean()
            };
        };
        let Some(statement) = FinancialStatement::from_payload(payload, field) else {
            tracing::warn!(class = %class, field, "Statement section missing from payload");
            return DataQuality {
                recovered,
                ..DataQuality::clean()
            };
        };

        let report = FinancialValidator::new(self.config.validator_for(class)).validate(&statement);
        for warning in &report.warnings {
            tracing::warn!(class = %class, code = warning.code(), detail = %warning, "Validation warning");
        }
        if report.statement != statement {
            report.statement.write_into(payload, field);
        }
        report.into_quality(recovered)
    }

    /// Write to the store; failures are logged and reported, never raised.
    async fn persist(&self, document: &VersionedDocument) -> Option<String> {
        let class = document.document_class;
        let error = match timeout(self.config.store_timeout, self.store.upsert(document)).await {
            Ok(Ok(outcome)) => {
                tracing::debug!(class = %class, version = %document.version_label, ?outcome, "Persisted document");
                return None;
            }
            Ok(Err(e)) => StorageError::PersistenceFailed {
                subject: document.subject_key.to_string(),
                class,
                reason: e.to_string(),
            },
            Err(_) => StorageError::Timeout {
                operation: format!("upsert({class})"),
                elapsed: self.config.store_timeout,
            },
        };
        tracing::warn!(class = %class, error = %error, "Document not persisted, serving in-memory result");
        Some(error.to_string())
    }
}

impl<C: Clock> std::fmt::Debug for Reconciler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Version label for a new document: the payload's own label when it
/// parses, else the probe's latest label, else [`UNVERSIONED_LABEL`].
/// Parsable labels are stored in canonical form (`Q3FY2025`, `FY2025`).
pub fn document_label(schema: &SchemaProfile, payload: &Value, probe_latest: Option<&str>) -> String {
    if let Some(period) = schema.version_of(payload).and_then(parse_version_label) {
        return period.label();
    }
    match probe_latest {
        Some(label) => parse_version_label(label)
            .map(|period| period.label())
            .unwrap_or_else(|| label.to_string()),
        None => UNVERSIONED_LABEL.to_string(),
    }
}
