//! Request options and the per-class result bundle.

use fincache_core::{DataSource, DocumentClass, SubjectKey, ValidationWarning, VersionedDocument};
use fincache_storage::FreshnessDecision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-class force-refresh flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    pub force_refresh_annual: bool,
    pub force_refresh_quarterly: bool,
    pub force_refresh_earnings_call: bool,
}

impl ReconcileOptions {
    pub fn force_all() -> Self {
        Self {
            force_refresh_annual: true,
            force_refresh_quarterly: true,
            force_refresh_earnings_call: true,
        }
    }

    pub fn force(mut self, class: DocumentClass) -> Self {
        match class {
            DocumentClass::Annual => self.force_refresh_annual = true,
            DocumentClass::Quarterly => self.force_refresh_quarterly = true,
            DocumentClass::EarningsCall => self.force_refresh_earnings_call = true,
        }
        self
    }

    pub fn is_forced(&self, class: DocumentClass) -> bool {
        match class {
            DocumentClass::Annual => self.force_refresh_annual,
            DocumentClass::Quarterly => self.force_refresh_quarterly,
            DocumentClass::EarningsCall => self.force_refresh_earnings_call,
        }
    }
}

/// What happened to one document class during a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOutcome {
    pub source: DataSource,
    /// Served document. On `Error` this is the stale document still held,
    /// if any.
    pub document: Option<VersionedDocument>,
    /// Human-readable failure reason, set only for `Error`.
    pub error: Option<String>,
    pub warnings: Vec<ValidationWarning>,
    /// Set when a fresh document could not be written to the store.
    pub persist_error: Option<String>,
    pub decision: FreshnessDecision,
}

impl ClassOutcome {
    pub(crate) fn cached(document: VersionedDocument, decision: FreshnessDecision) -> Self {
        Self {
            source: DataSource::Cache,
            warnings: document.quality.warnings.clone(),
            document: Some(document),
            error: None,
            persist_error: None,
            decision,
        }
    }

    pub(crate) fn fresh(
        document: VersionedDocument,
        persist_error: Option<String>,
        decision: FreshnessDecision,
    ) -> Self {
        Self {
            source: DataSource::Fresh,
            warnings: document.quality.warnings.clone(),
            document: Some(document),
            error: None,
            persist_error,
            decision,
        }
    }

    pub(crate) fn failed(
        reason: String,
        stale: Option<VersionedDocument>,
        decision: FreshnessDecision,
    ) -> Self {
        Self {
            source: DataSource::Error,
            document: stale,
            error: Some(reason),
            warnings: Vec::new(),
            persist_error: None,
            decision,
        }
    }

    pub fn version_label(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.version_label.as_str())
    }
}

/// Result of one reconcile request. Always complete: every class has an
/// outcome, failed ones included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub request_id: Uuid,
    pub subject_key: SubjectKey,
    pub annual: ClassOutcome,
    pub quarterly: ClassOutcome,
    pub earnings_call: ClassOutcome,
    /// Classes scheduled for regeneration in this request. A scheduled class
    /// counts even when its generator is missing, fails or times out.
    pub generation_calls: usize,
}

impl Bundle {
    pub fn outcome(&self, class: DocumentClass) -> &ClassOutcome {
        match class {
            DocumentClass::Annual => &self.annual,
            DocumentClass::Quarterly => &self.quarterly,
            DocumentClass::EarningsCall => &self.earnings_call,
        }
    }

    pub fn source_of(&self, class: DocumentClass) -> DataSource {
        self.outcome(class).source
    }

    pub fn per_class_source(&self) -> BTreeMap<DocumentClass, DataSource> {
        DocumentClass::ALL
            .into_iter()
            .map(|class| (class, self.source_of(class)))
            .collect()
    }

    pub fn all_from_cache(&self) -> bool {
        DocumentClass::ALL
            .into_iter()
            .all(|class| self.source_of(class) == DataSource::Cache)
    }

    pub fn failed_classes(&self) -> Vec<DocumentClass> {
        DocumentClass::ALL
            .into_iter()
            .filter(|class| self.source_of(*class) == DataSource::Error)
            .collect()
    }
}
