//! Error types for fincache operations

use crate::{DocumentClass, ForecastSource};
use std::time::Duration;
use thiserror::Error;

/// Version probe errors. Always soft: callers fail open and reuse cached data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Version probe unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Version probe timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
}

/// LLM generator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No generator configured for {class}")]
    ProviderNotConfigured { class: DocumentClass },

    #[error("Generation failed for {class}: {reason}")]
    GenerationFailed { class: DocumentClass, reason: String },

    #[error("Generation for {class} timed out after {elapsed:?}")]
    Timeout {
        class: DocumentClass,
        elapsed: Duration,
    },
}

/// Payload recovery errors. Terminal for the attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("Payload is empty")]
    Empty,

    #[error("Payload root is not a JSON object")]
    NotAnObject,

    #[error("Malformed payload at line {line}, column {column}: {reason}")]
    Malformed {
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("Safe cut field '{field}' not found in truncated payload")]
    CutFieldNotFound { field: String },

    #[error("Safe cut field '{field}' is itself truncated")]
    UnterminatedCutField { field: String },

    #[error("Salvage parse failed after cut at byte {cut_at}: {reason}")]
    SalvageFailed { cut_at: usize, reason: String },
}

/// Forecast provider and price feed errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForecastError {
    #[error("{provider} forecast provider failed: {reason}")]
    ProviderFailed {
        provider: ForecastSource,
        reason: String,
    },

    #[error("{provider} forecast provider timed out after {elapsed:?}")]
    Timeout {
        provider: ForecastSource,
        elapsed: Duration,
    },

    #[error("No current price for {subject}: {reason}")]
    PriceUnavailable { subject: String, reason: String },
}

/// Document store and cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Persisting {class} document for {subject} failed: {reason}")]
    PersistenceFailed {
        subject: String,
        class: DocumentClass,
        reason: String,
    },

    #[error("Reading {class} document for {subject} failed: {reason}")]
    ReadFailed {
        subject: String,
        class: DocumentClass,
        reason: String,
    },

    #[error("Storage operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },
}

/// Validation errors for caller input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Subject mismatch: expected {expected}, got {got}")]
    SubjectMismatch { expected: String, got: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all fincache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FincacheError {
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for fincache operations.
pub type FincacheResult<T> = Result<T, FincacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display_unavailable() {
        let err = ProbeError::Unavailable {
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("unavailable"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_llm_error_display_generation_failed() {
        let err = LlmError::GenerationFailed {
            class: DocumentClass::Quarterly,
            reason: "upstream 503".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Generation failed"));
        assert!(msg.contains("quarterly"));
        assert!(msg.contains("upstream 503"));
    }

    #[test]
    fn test_recovery_error_display_cut_field() {
        let err = RecoveryError::CutFieldNotFound {
            field: "risks".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("'risks'"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_storage_error_display_persistence_failed() {
        let err = StorageError::PersistenceFailed {
            subject: "RELIANCE".to_string(),
            class: DocumentClass::Annual,
            reason: "disk full".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("RELIANCE"));
        assert!(msg.contains("annual"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_storage_error_display_timeout() {
        let err = StorageError::Timeout {
            operation: "upsert(annual)".to_string(),
            elapsed: Duration::from_secs(5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("'upsert(annual)'"));
        assert!(msg.contains("5s"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "probe_timeout".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("probe_timeout"));
        assert!(msg.contains("0"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_forecast_error_display_timeout() {
        let err = ForecastError::Timeout {
            provider: ForecastSource::Narrative,
            elapsed: Duration::from_secs(60),
        };
        let msg = format!("{}", err);
        assert!(msg.starts_with("narrative forecast provider"));
        assert!(msg.contains("60s"));
        assert!(matches!(FincacheError::from(err), FincacheError::Forecast(_)));
    }

    #[test]
    fn test_fincache_error_from_variants() {
        let probe = FincacheError::from(ProbeError::Unavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(probe, FincacheError::Probe(_)));

        let llm = FincacheError::from(LlmError::ProviderNotConfigured {
            class: DocumentClass::EarningsCall,
        });
        assert!(matches!(llm, FincacheError::Llm(_)));

        let recovery = FincacheError::from(RecoveryError::Empty);
        assert!(matches!(recovery, FincacheError::Recovery(_)));

        let storage = FincacheError::from(StorageError::Timeout {
            operation: "find_latest(annual)".to_string(),
            elapsed: Duration::from_secs(5),
        });
        assert!(matches!(storage, FincacheError::Storage(_)));

        let validation = FincacheError::from(ValidationError::RequiredFieldMissing {
            field: "subject_key".to_string(),
        });
        assert!(matches!(validation, FincacheError::Validation(_)));

        let config = FincacheError::from(ConfigError::InvalidValue {
            field: "weights".to_string(),
            value: "1.2".to_string(),
            reason: "must sum to 1".to_string(),
        });
        assert!(matches!(config, FincacheError::Config(_)));
    }
}
