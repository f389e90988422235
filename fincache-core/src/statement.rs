//! Balance-sheet style figures extracted from a document payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current and previous period values of one line item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuePair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<f64>,
}

impl ValuePair {
    pub fn new(current: Option<f64>, previous: Option<f64>) -> Self {
        Self { current, previous }
    }

    pub fn current(value: f64) -> Self {
        Self {
            current: Some(value),
            previous: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.previous.is_none()
    }

    /// Parse a line item from JSON.
    ///
    /// Accepts `{"current": x, "previous": y}` objects or a bare scalar
    /// (taken as `current`). Numbers may be JSON numbers or numeric strings
    /// with thousands separators.
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                current: map.get("current").and_then(number_of),
                previous: map.get("previous").and_then(number_of),
            },
            other => Self {
                current: number_of(other),
                previous: None,
            },
        }
    }
}

fn number_of(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Figures the validator reasons about.
///
/// Soft invariant: `total_assets ≈ total_equity + total_liabilities`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStatement {
    #[serde(default)]
    pub total_assets: ValuePair,
    #[serde(default)]
    pub total_equity: ValuePair,
    #[serde(default)]
    pub total_liabilities: ValuePair,
    #[serde(default)]
    pub revenue: ValuePair,
    #[serde(default)]
    pub net_profit: ValuePair,
}

const FIELDS: [&str; 5] = [
    "totalAssets",
    "totalEquity",
    "totalLiabilities",
    "revenue",
    "netProfit",
];

impl FinancialStatement {
    /// Extract the statement stored under `field` in a document payload.
    ///
    /// Returns `None` when the field is absent or not an object. Unknown
    /// keys are ignored; unparsable numbers are treated as missing.
    pub fn from_payload(payload: &Value, field: &str) -> Option<Self> {
        let section = payload.get(field)?.as_object()?;
        let pair = |name: &str| section.get(name).map(ValuePair::from_json).unwrap_or_default();
        Some(Self {
            total_assets: pair("totalAssets"),
            total_equity: pair("totalEquity"),
            total_liabilities: pair("totalLiabilities"),
            revenue: pair("revenue"),
            net_profit: pair("netProfit"),
        })
    }

    /// Write the figures back under `field`, keeping any other keys the
    /// section already had. A discarded line item is removed.
    pub fn write_into(&self, payload: &mut Value, field: &str) {
        let Some(root) = payload.as_object_mut() else {
            return;
        };
        let section = root
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        let Some(section) = section.as_object_mut() else {
            return;
        };
        for (name, pair) in FIELDS.iter().zip(self.pairs()) {
            if pair.is_empty() {
                section.remove(*name);
            } else if let Ok(value) = serde_json::to_value(pair) {
                section.insert((*name).to_string(), value);
            }
        }
    }

    fn pairs(&self) -> [&ValuePair; 5] {
        [
            &self.total_assets,
            &self.total_equity,
            &self.total_liabilities,
            &self.revenue,
            &self.net_profit,
        ]
    }
}
