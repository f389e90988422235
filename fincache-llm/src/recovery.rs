//! Salvage parsing of truncated generator output.
//!
//! Generators hit output-token limits and stop mid-document. When that
//! happens after a known "safe cut" array field has been fully written, the
//! prefix up to that array is still a useful document: everything after the
//! array is dropped and the root object is closed.
//!
//! Recovery never fabricates data. A salvaged payload is always a byte prefix
//! of the input followed by exactly one `}`.

use fincache_core::RecoveryError;
use serde::Serialize;
use serde_json::Value;

use crate::SchemaProfile;

/// How a payload was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Parsed as-is.
    Clean,
    /// Cut after the safe field; `dropped_bytes` of trailing input discarded.
    Salvaged { cut_at: usize, dropped_bytes: usize },
}

/// A parsed payload. `value` is always a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredPayload {
    pub value: Value,
    pub outcome: RecoveryOutcome,
}

impl RecoveredPayload {
    pub fn was_salvaged(&self) -> bool {
        matches!(self.outcome, RecoveryOutcome::Salvaged { .. })
    }
}

/// Scratch state of one salvage attempt, surfaced only in debug logs.
#[derive(Debug)]
struct RecoveryAttempt<'a> {
    raw_text: &'a str,
    cut_points: Vec<usize>,
    recovered: bool,
}

/// Bracket-matching scanner state.
#[derive(Debug, Default)]
struct Scanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Feed one byte; returns true when the opening bracket is balanced.
    fn step(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return false;
        }
        match byte {
            b'"' => self.in_string = true,
            b'[' | b'{' => self.depth += 1,
            b']' | b'}' => {
                self.depth = self.depth.saturating_sub(1);
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

/// Salvage parser bound to one safe cut field.
#[derive(Debug, Clone)]
pub struct PayloadRecovery {
    safe_cut_field: String,
}

impl PayloadRecovery {
    pub fn new(safe_cut_field: impl Into<String>) -> Self {
        Self {
            safe_cut_field: safe_cut_field.into(),
        }
    }

    pub fn for_profile(profile: &SchemaProfile) -> Self {
        Self::new(profile.safe_cut_field)
    }

    pub fn safe_cut_field(&self) -> &str {
        &self.safe_cut_field
    }

    /// Parse generator output, salvaging a truncated payload when possible.
    ///
    /// Output that ends with the root-closing `}` but fails to parse is a
    /// genuine syntax error and is not salvaged.
    pub fn recover(&self, raw: &str) -> Result<RecoveredPayload, RecoveryError> {
        let text = strip_fences(raw);
        if text.is_empty() {
            return Err(RecoveryError::Empty);
        }

        let parse_error = match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => {
                return Ok(RecoveredPayload {
                    value,
                    outcome: RecoveryOutcome::Clean,
                })
            }
            Ok(_) => return Err(RecoveryError::NotAnObject),
            Err(e) => e,
        };

        if !text.starts_with('{') {
            return Err(RecoveryError::NotAnObject);
        }
        if text.ends_with('}') {
            return Err(RecoveryError::Malformed {
                line: parse_error.line(),
                column: parse_error.column(),
                reason: parse_error.to_string(),
            });
        }

        self.salvage(text)
    }

    fn salvage(&self, text: &str) -> Result<RecoveredPayload, RecoveryError> {
        let mut attempt = RecoveryAttempt {
            raw_text: text,
            cut_points: Vec::new(),
            recovered: false,
        };

        let open = find_array_start(text, &self.safe_cut_field).ok_or_else(|| {
            RecoveryError::CutFieldNotFound {
                field: self.safe_cut_field.clone(),
            }
        })?;
        attempt.cut_points.push(open);

        let mut scanner = Scanner::default();
        let close = text.as_bytes()[open..]
            .iter()
            .position(|b| scanner.step(*b))
            .map(|offset| open + offset)
            .ok_or_else(|| RecoveryError::UnterminatedCutField {
                field: self.safe_cut_field.clone(),
            })?;
        let cut_at = close + 1;
        attempt.cut_points.push(cut_at);

        let mut candidate = String::with_capacity(cut_at + 1);
        candidate.push_str(&text[..cut_at]);
        candidate.push('}');

        let result = match serde_json::from_str::<Value>(&candidate) {
            Ok(value @ Value::Object(_)) => {
                attempt.recovered = true;
                Ok(RecoveredPayload {
                    value,
                    outcome: RecoveryOutcome::Salvaged {
                        cut_at,
                        dropped_bytes: text.len() - cut_at,
                    },
                })
            }
            Ok(_) => Err(RecoveryError::NotAnObject),
            Err(e) => Err(RecoveryError::SalvageFailed {
                cut_at,
                reason: e.to_string(),
            }),
        };

        tracing::debug!(
            field = %self.safe_cut_field,
            raw_len = attempt.raw_text.len(),
            cut_points = ?attempt.cut_points,
            recovered = attempt.recovered,
            "payload salvage attempt"
        );
        result
    }
}

/// Trim whitespace and markdown code fences around a payload.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```JSON") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    text = text.trim();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Byte offset of the `[` opening the last `"field": [` occurrence.
fn find_array_start(text: &str, field: &str) -> Option<usize> {
    let quoted = format!("\"{}\"", field);
    text.rmatch_indices(&quoted).find_map(|(at, _)| {
        // An escaped quote means the name sits inside a string value.
        if at > 0 && text.as_bytes()[at - 1] == b'\\' {
            return None;
        }
        let after = &text[at + quoted.len()..];
        let rest = after.trim_start().strip_prefix(':')?;
        let value = rest.trim_start();
        value
            .starts_with('[')
            .then(|| text.len() - value.len())
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRUNCATED: &str = r#"{"fiscalYear":"FY2025","financials":{"totalAssets":{"current":124936}},"risks":["Currency exposure","Regulatory change in [APAC]"],"summary":"Revenue grew on strong dem"#;

    fn annual() -> PayloadRecovery {
        PayloadRecovery::new("risks")
    }

    #[test]
    fn test_clean_payload_parses() {
        let out = annual().recover(r#"{"fiscalYear":"FY2025","risks":[]}"#).unwrap();
        assert_eq!(out.outcome, RecoveryOutcome::Clean);
        assert_eq!(out.value["fiscalYear"], "FY2025");
    }

    #[test]
    fn test_fences_stripped() {
        let raw = "```json\n{\"risks\": [\"a\"]}\n```";
        let out = annual().recover(raw).unwrap();
        assert_eq!(out.outcome, RecoveryOutcome::Clean);
        assert_eq!(out.value["risks"][0], "a");
    }

    #[test]
    fn test_truncated_payload_salvaged() {
        let out = annual().recover(TRUNCATED).unwrap();
        assert!(out.was_salvaged());
        assert_eq!(out.value["fiscalYear"], "FY2025");
        assert_eq!(out.value["risks"][1], "Regulatory change in [APAC]");
        assert!(out.value.get("summary").is_none());
        match out.outcome {
            RecoveryOutcome::Salvaged { cut_at, dropped_bytes } => {
                assert_eq!(cut_at + dropped_bytes, TRUNCATED.len());
                assert!(TRUNCATED[..cut_at].ends_with(']'));
            }
            RecoveryOutcome::Clean => panic!("expected salvage"),
        }
    }

    #[test]
    fn test_syntax_error_is_not_salvaged() {
        let err = annual().recover(r#"{"risks": ["a"], "x": tru}"#).unwrap_err();
        assert!(matches!(err, RecoveryError::Malformed { .. }));
    }

    #[test]
    fn test_missing_cut_field() {
        let err = annual().recover(r#"{"summary": "cut her"#).unwrap_err();
        assert_eq!(
            err,
            RecoveryError::CutFieldNotFound {
                field: "risks".to_string()
            }
        );
    }

    #[test]
    fn test_cut_field_itself_truncated() {
        let err = annual().recover(r#"{"fiscalYear":"FY25","risks":["a","b"#).unwrap_err();
        assert!(matches!(err, RecoveryError::UnterminatedCutField { .. }));
    }

    #[test]
    fn test_escaped_quotes_and_brackets_in_strings() {
        let raw = r#"{"risks":["say \"]\" twice","{not an object"],"tail":"zz"#;
        let out = annual().recover(raw).unwrap();
        assert_eq!(out.value["risks"][0], "say \"]\" twice");
        assert_eq!(out.value["risks"][1], "{not an object");
    }

    #[test]
    fn test_field_name_inside_string_is_ignored() {
        let raw = r#"{"risks":["x"],"note":"see \"risks\": [ above","tail":"#;
        let out = annual().recover(raw).unwrap();
        assert_eq!(out.value, json!({"risks": ["x"]}));
    }

    #[test]
    fn test_nested_cut_field_fails_salvage() {
        // One closing brace cannot close two open objects.
        let raw = r#"{"outer":{"risks":["a"],"more":"x"#;
        let err = annual().recover(raw).unwrap_err();
        assert!(matches!(err, RecoveryError::SalvageFailed { .. }));
    }

    #[test]
    fn test_empty_and_non_object() {
        assert_eq!(annual().recover("  ```json ``` ").unwrap_err(), RecoveryError::Empty);
        assert_eq!(annual().recover("[1, 2]").unwrap_err(), RecoveryError::NotAnObject);
        assert_eq!(annual().recover("[1, 2").unwrap_err(), RecoveryError::NotAnObject);
    }

    #[test]
    fn test_salvaged_output_is_idempotent() {
        let first = annual().recover(TRUNCATED).unwrap();
        let again = annual().recover(&first.value.to_string()).unwrap();
        assert_eq!(again.outcome, RecoveryOutcome::Clean);
        assert_eq!(again.value, first.value);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_item() -> impl Strategy<Value = String> {
        // Strings that exercise quotes, escapes and brackets.
        prop::collection::vec(
            prop::sample::select(vec!["a", "b", " ", "[", "]", "{", "}", "\"", "\\", ":", ","]),
            0..12,
        )
        .prop_map(|parts| parts.concat())
    }

    fn arb_document() -> impl Strategy<Value = (Value, String, String)> {
        (
            prop::collection::vec(arb_item(), 0..5),
            arb_item(),
            "[a-z ]{1,40}",
        )
            .prop_map(|(risks, label, tail)| {
                let head = serde_json::json!({ "label": label, "risks": risks });
                let body = head.to_string();
                // Append a trailing field that will be truncated.
                let full = format!(
                    "{},\"summary\":{}}}",
                    &body[..body.len() - 1],
                    Value::String(tail).to_string()
                );
                (head, body, full)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Truncating anywhere inside the trailing field yields exactly the
        /// fields before it.
        #[test]
        fn prop_salvage_never_fabricates((head, body, full) in arb_document(), cut in 0usize..1000) {
            let start = body.len() - 1 + ",\"summary\":".len();
            let end = full.len() - 1;
            let cut_at = start + cut % (end - start);
            let truncated = &full[..cut_at];
            let out = PayloadRecovery::new("risks").recover(truncated).unwrap();
            prop_assert_eq!(out.value, head);
        }

        /// Re-feeding a recovered payload returns the same object, cleanly.
        #[test]
        fn prop_recovery_idempotent((_, body, full) in arb_document(), cut in 0usize..1000) {
            let start = body.len() - 1 + ",\"summary\":".len();
            let end = full.len() - 1;
            let truncated = &full[..start + cut % (end - start)];
            let recovery = PayloadRecovery::new("risks");
            let first = recovery.recover(truncated).unwrap();
            let second = recovery.recover(&first.value.to_string()).unwrap();
            prop_assert_eq!(second.outcome, RecoveryOutcome::Clean);
            prop_assert_eq!(second.value, first.value);
        }

        /// Whatever the input, recovery either errors or returns an object.
        #[test]
        fn prop_never_panics(raw in ".{0,200}") {
            if let Ok(out) = PayloadRecovery::new("risks").recover(&raw) {
                prop_assert!(out.value.is_object());
            }
        }
    }
}
