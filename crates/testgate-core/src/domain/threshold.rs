//! Quality threshold definitions.

use serde::{Deserialize, Serialize};

/// Comparison direction of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Passes when the metric is `>=` the threshold (coverage, success rate).
    AtLeast,
    /// Passes when the metric is `<=` the threshold (latency, vulnerability count).
    AtMost,
}

impl Polarity {
    /// Compare `actual` against `limit` in this direction.
    pub fn passes(self, actual: f64, limit: f64) -> bool {
        match self {
            Polarity::AtLeast => actual >= limit,
            Polarity::AtMost => actual <= limit,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Polarity::AtLeast => ">=",
            Polarity::AtMost => "<=",
        }
    }
}

/// A named quality threshold.
///
/// Thresholds are only constructed by the registry and never change once a
/// run has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Registry key, e.g. `overall_test_coverage`.
    pub key: String,

    /// Display label, e.g. `Overall Test Coverage`.
    pub name: String,

    pub value: f64,

    /// Failure blocks deployment.
    pub critical: bool,

    pub polarity: Polarity,

    /// Unit suffix used in messages (`%`, `min`, `ms`, ...). Empty for counts.
    pub unit: String,

    pub description: String,
}

impl Threshold {
    pub(crate) fn new(
        key: &str,
        name: &str,
        value: f64,
        critical: bool,
        polarity: Polarity,
        unit: &str,
        description: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            value,
            critical,
            polarity,
            unit: unit.to_string(),
            description: description.to_string(),
        }
    }

    /// Whether `actual` satisfies this threshold.
    pub fn is_met_by(&self, actual: f64) -> bool {
        self.polarity.passes(actual, self.value)
    }

    /// Format a value with this threshold's unit.
    pub fn format_value(&self, value: f64) -> String {
        match self.unit.as_str() {
            "" => format!("{value:.0}"),
            "%" => format!("{value:.2}%"),
            unit => format!("{value:.2} {unit}"),
        }
    }
}
