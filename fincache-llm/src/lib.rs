//! FINCACHE LLM - Generator Contracts and Payload Recovery
//!
//! Provider-agnostic traits for the upstream document generator and the
//! version probe, the per-class schema profiles, and the salvage parser for
//! truncated generator output. Concrete providers are user-supplied.

pub mod recovery;
pub mod schema;

pub use recovery::{strip_fences, PayloadRecovery, RecoveredPayload, RecoveryOutcome};
pub use schema::{SchemaProfile, ANNUAL_V1, EARNINGS_CALL_V1, QUARTERLY_V1};

use async_trait::async_trait;
use fincache_core::{DocumentClass, FincacheError, FincacheResult, LlmError, ProbeError, SubjectKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// VERSION PROBE
// ============================================================================

/// Latest version labels upstream knows about, per class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersions {
    pub annual: Option<String>,
    pub quarterly: Option<String>,
    pub earnings_call: Option<String>,
}

impl LatestVersions {
    /// No version known for any class (probe failed or timed out).
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn get(&self, class: DocumentClass) -> Option<&str> {
        match class {
            DocumentClass::Annual => self.annual.as_deref(),
            DocumentClass::Quarterly => self.quarterly.as_deref(),
            DocumentClass::EarningsCall => self.earnings_call.as_deref(),
        }
    }

    pub fn with(mut self, class: DocumentClass, label: impl Into<String>) -> Self {
        let slot = match class {
            DocumentClass::Annual => &mut self.annual,
            DocumentClass::Quarterly => &mut self.quarterly,
            DocumentClass::EarningsCall => &mut self.earnings_call,
        };
        *slot = Some(label.into());
        self
    }
}

/// Cheap lookup of the latest published versions for a subject.
///
/// Callers treat any error as "unknown" and keep serving cached data.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    async fn latest_versions(&self, subject: &SubjectKey) -> Result<LatestVersions, ProbeError>;
}

// ============================================================================
// GENERATOR
// ============================================================================

/// What the generator is told about the document it must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationContext {
    pub latest_version: Option<String>,
    pub cached_version: Option<String>,
    pub schema: &'static SchemaProfile,
}

impl GenerationContext {
    pub fn new(class: DocumentClass) -> Self {
        Self {
            latest_version: None,
            cached_version: None,
            schema: SchemaProfile::for_class(class),
        }
    }

    pub fn with_latest_version(mut self, version: Option<String>) -> Self {
        self.latest_version = version;
        self
    }

    pub fn with_cached_version(mut self, version: Option<String>) -> Self {
        self.cached_version = version;
        self
    }
}

/// Expensive upstream extraction step (an LLM call over scraped text).
///
/// Returns raw serialized output, which may be truncated or malformed.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        class: DocumentClass,
        subject: &SubjectKey,
        context: &GenerationContext,
    ) -> Result<String, LlmError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(
        &self,
        class: DocumentClass,
        subject: &SubjectKey,
        context: &GenerationContext,
    ) -> Result<String, LlmError> {
        (**self).generate(class, subject, context).await
    }
}

// ============================================================================
// GENERATOR REGISTRY
// ============================================================================

/// Registry of generators per document class.
/// Generators must be explicitly registered - no auto-discovery.
///
/// # Example
/// ```ignore
/// let registry = GeneratorRegistry::new()
///     .with_default(Arc::new(extractor))
///     .with_class(DocumentClass::EarningsCall, Arc::new(transcript_summarizer));
/// ```
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    default: Option<Arc<dyn Generator>>,
    per_class: HashMap<DocumentClass, Arc<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator used for classes without a dedicated one.
    pub fn with_default(mut self, generator: Arc<dyn Generator>) -> Self {
        self.default = Some(generator);
        self
    }

    pub fn with_class(mut self, class: DocumentClass, generator: Arc<dyn Generator>) -> Self {
        self.per_class.insert(class, generator);
        self
    }

    /// Get the generator for a class.
    ///
    /// # Returns
    /// * `Err(FincacheError::Llm(LlmError::ProviderNotConfigured))` - If neither a
    ///   class-specific nor a default generator is registered
    pub fn generator(&self, class: DocumentClass) -> FincacheResult<Arc<dyn Generator>> {
        self.per_class
            .get(&class)
            .or(self.default.as_ref())
            .cloned()
            .ok_or(FincacheError::Llm(LlmError::ProviderNotConfigured { class }))
    }

    pub fn has_generator(&self, class: DocumentClass) -> bool {
        self.per_class.contains_key(&class) || self.default.is_some()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<_> = self.per_class.keys().collect();
        classes.sort();
        f.debug_struct("GeneratorRegistry")
            .field("default", &self.default.is_some())
            .field("per_class", &classes)
            .finish()
    }
}

// Dispatches to the registered generator; a missing one fails the class only.
#[async_trait]
impl Generator for GeneratorRegistry {
    async fn generate(
        &self,
        class: DocumentClass,
        subject: &SubjectKey,
        context: &GenerationContext,
    ) -> Result<String, LlmError> {
        let generator = self
            .per_class
            .get(&class)
            .or(self.default.as_ref())
            .ok_or(LlmError::ProviderNotConfigured { class })?;
        generator.generate(class, subject, context).await
    }
}
