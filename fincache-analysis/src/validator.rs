//! Accounting checks on extracted balance-sheet figures.
//!
//! The validator never rejects a document. It repairs what it safely can
//! (discarding a liabilities figure that is really the assets total, deriving
//! liabilities from `assets - equity`) and records everything else as
//! warnings on the report.

use fincache_core::{DataQuality, FinancialStatement, ValidationWarning, ValidatorConfig};
use serde::Serialize;

use crate::round2;

pub const DERIVED_LIABILITIES_CURRENT: &str = "totalLiabilities.current";
pub const DERIVED_LIABILITIES_PREVIOUS: &str = "totalLiabilities.previous";

/// Result of validating one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Statement after repairs.
    pub statement: FinancialStatement,
    /// Warnings in the order the checks ran.
    pub warnings: Vec<ValidationWarning>,
    pub derived_fields: Vec<String>,
    pub liabilities_discarded: bool,
    /// `|assets - (equity + liabilities)|`, when all three were available.
    pub equation_diff: Option<f64>,
}

impl ValidationReport {
    fn new(statement: FinancialStatement) -> Self {
        Self {
            statement,
            warnings: Vec::new(),
            derived_fields: Vec::new(),
            liabilities_discarded: false,
            equation_diff: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code() == code)
    }

    /// Fold this report into a document quality record.
    pub fn into_quality(self, recovered: bool) -> DataQuality {
        DataQuality {
            recovered,
            derived_fields: self.derived_fields,
            warnings: self.warnings,
        }
    }
}

/// Validates and repairs balance-sheet figures.
#[derive(Debug, Clone, Default)]
pub struct FinancialValidator {
    config: ValidatorConfig,
}

fn present_nonzero(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v != 0.0)
}

fn magnitude(values: &[f64]) -> Option<i32> {
    values
        .iter()
        .map(|v| v.abs())
        .filter(|v| *v > 0.0)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .map(|max| max.log10().floor() as i32)
}

impl FinancialValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run every check in order and return the repaired statement.
    pub fn validate(&self, statement: &FinancialStatement) -> ValidationReport {
        let mut report = ValidationReport::new(statement.clone());

        self.check_misextracted_liabilities(&mut report);
        self.derive_liabilities(&mut report);
        self.check_equation(&mut report);
        self.check_scale(&mut report);
        self.check_period_minimum(&mut report);

        report
    }

    /// Liabilities equal to total assets are the assets line read twice.
    fn check_misextracted_liabilities(&self, report: &mut ValidationReport) {
        let stmt = &report.statement;
        let (Some(assets), Some(liabilities)) =
            (stmt.total_assets.current, stmt.total_liabilities.current)
        else {
            return;
        };
        if (assets - liabilities).abs() < self.config.liabilities_epsilon {
            report.statement.total_liabilities.current = None;
            report.liabilities_discarded = true;
            report.warnings.push(ValidationWarning::LiabilitiesMisextracted {
                total_assets: assets,
                total_liabilities: liabilities,
            });
        }
    }

    fn derive_liabilities(&self, report: &mut ValidationReport) {
        let stmt = &mut report.statement;

        if !present_nonzero(stmt.total_liabilities.current) {
            if let (Some(assets), Some(equity)) =
                (stmt.total_assets.current, stmt.total_equity.current)
            {
                stmt.total_liabilities.current = Some(round2(assets - equity));
                report.derived_fields.push(DERIVED_LIABILITIES_CURRENT.to_string());
            }
        }

        if !present_nonzero(stmt.total_liabilities.previous) {
            if let (Some(assets), Some(equity)) =
                (stmt.total_assets.previous, stmt.total_equity.previous)
            {
                stmt.total_liabilities.previous = Some(round2(assets - equity));
                report.derived_fields.push(DERIVED_LIABILITIES_PREVIOUS.to_string());
            }
        }
    }

    fn check_equation(&self, report: &mut ValidationReport) {
        let stmt = &report.statement;
        let figures = [
            ("totalAssets.current", stmt.total_assets.current),
            ("totalEquity.current", stmt.total_equity.current),
            ("totalLiabilities.current", stmt.total_liabilities.current),
        ];
        let missing: Vec<String> = figures
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        let [(_, Some(assets)), (_, Some(equity)), (_, Some(liabilities))] = figures else {
            report.warnings.push(ValidationWarning::MissingFigures { missing });
            return;
        };

        let diff = (assets - (equity + liabilities)).abs();
        report.equation_diff = Some(diff);
        if diff > self.config.equation_tolerance * assets.abs() {
            report.warnings.push(ValidationWarning::EquationMismatch {
                total_assets: assets,
                total_equity: equity,
                total_liabilities: liabilities,
                diff,
            });
        }
    }

    /// Integer-formatted and decimal-formatted figures several orders of
    /// magnitude apart suggest the extractor mixed units (e.g. rupees and crores).
    fn check_scale(&self, report: &mut ValidationReport) {
        let stmt = &report.statement;
        let (integers, decimals): (Vec<f64>, Vec<f64>) = [
            stmt.total_assets.current,
            stmt.total_equity.current,
            stmt.total_liabilities.current,
        ]
        .into_iter()
        .flatten()
        .filter(|v| *v != 0.0)
        .partition(|v| v.fract() == 0.0);

        let (Some(integer_magnitude), Some(decimal_magnitude)) =
            (magnitude(&integers), magnitude(&decimals))
        else {
            return;
        };
        if integer_magnitude.abs_diff(decimal_magnitude) >= self.config.scale_gap_orders {
            report.warnings.push(ValidationWarning::ScaleInconsistent {
                integer_magnitude,
                decimal_magnitude,
            });
        }
    }

    fn check_period_minimum(&self, report: &mut ValidationReport) {
        let (Some(minimum), Some(assets)) =
            (self.config.min_total_assets, report.statement.total_assets.current)
        else {
            return;
        };
        if assets < minimum {
            report.warnings.push(ValidationWarning::BelowPeriodMinimum {
                total_assets: assets,
                minimum,
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use fincache_core::ValuePair;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Derived liabilities always close the equation.
        #[test]
        fn prop_derived_liabilities_balance(
            assets in 1_000i64..10_000_000,
            equity_share in 0.05f64..0.95,
        ) {
            let assets = assets as f64;
            let equity = (assets * equity_share).round();
            let input = FinancialStatement {
                total_assets: ValuePair::current(assets),
                total_equity: ValuePair::current(equity),
                ..Default::default()
            };
            let report = FinancialValidator::default().validate(&input);
            prop_assert!(!report.has_warning("equation_mismatch"));
            prop_assert!(!report.has_warning("missing_figures"));
            prop_assert_eq!(report.derived_fields.len(), 1);
        }

        /// Validation never removes assets or equity.
        #[test]
        fn prop_assets_and_equity_untouched(
            assets in proptest::option::of(-1e9f64..1e9),
            equity in proptest::option::of(-1e9f64..1e9),
            liabilities in proptest::option::of(-1e9f64..1e9),
        ) {
            let input = FinancialStatement {
                total_assets: ValuePair::new(assets, None),
                total_equity: ValuePair::new(equity, None),
                total_liabilities: ValuePair::new(liabilities, None),
                ..Default::default()
            };
            let report = FinancialValidator::default().validate(&input);
            prop_assert_eq!(report.statement.total_assets, input.total_assets);
            prop_assert_eq!(report.statement.total_equity, input.total_equity);
        }
    }
}
