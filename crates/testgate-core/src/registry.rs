//! Threshold registry: built-in quality limits plus overrides.
//!
//! A registry is assembled once before a run and handed by reference to the
//! validator. There is no way to add, remove or change a threshold on an
//! existing registry; a different set of limits means building a new one.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{GateError, Polarity, Result, Threshold};

/// Registry keys of the built-in thresholds.
pub mod keys {
    pub const OVERALL_TEST_COVERAGE: &str = "overall_test_coverage";
    pub const CRITICAL_PATH_COVERAGE: &str = "critical_path_coverage";
    pub const SERVICE_LAYER_COVERAGE: &str = "service_layer_coverage";
    pub const UI_TEST_COVERAGE: &str = "ui_test_coverage";
    pub const MAX_TEST_EXECUTION_TIME: &str = "max_test_execution_time";
    pub const MAX_INDIVIDUAL_TEST_TIME: &str = "max_individual_test_time";
    pub const PERFORMANCE_REGRESSION: &str = "performance_regression_threshold";
    pub const MEMORY_LEAKS: &str = "memory_leak_threshold";
    pub const CRITICAL_VULNERABILITIES: &str = "critical_vulnerabilities";
    pub const HIGH_VULNERABILITIES: &str = "high_vulnerabilities";
    pub const MEDIUM_VULNERABILITIES: &str = "medium_vulnerabilities";
    pub const SECURITY_TEST_COVERAGE: &str = "security_test_coverage";
    pub const TEST_FLAKY_RATE: &str = "test_flaky_rate";
    pub const TEST_FAILURE_RATE: &str = "test_failure_rate";
    pub const CODE_QUALITY_SCORE: &str = "code_quality_score";
    pub const API_RESPONSE_TIME: &str = "api_response_time";
    pub const DATABASE_QUERY_TIME: &str = "database_query_time";
    pub const INTEGRATION_TEST_SUCCESS: &str = "integration_test_success";
}

#[rustfmt::skip]
fn default_thresholds() -> Vec<Threshold> {
    use keys::*;
    use Polarity::{AtLeast, AtMost};

    vec![
        // Coverage
        Threshold::new(OVERALL_TEST_COVERAGE, "Overall Test Coverage", 90.0, true, AtLeast, "%",
            "Minimum overall test coverage percentage"),
        Threshold::new(CRITICAL_PATH_COVERAGE, "Critical Path Coverage", 95.0, true, AtLeast, "%",
            "Coverage for payment, booking, and security flows"),
        Threshold::new(SERVICE_LAYER_COVERAGE, "Service Layer Coverage", 95.0, true, AtLeast, "%",
            "Coverage for all service protocol implementations"),
        Threshold::new(UI_TEST_COVERAGE, "UI Test Coverage", 80.0, false, AtLeast, "%",
            "UI component test coverage"),
        // Performance
        Threshold::new(MAX_TEST_EXECUTION_TIME, "Test Execution Time", 45.0, true, AtMost, "min",
            "Maximum total test suite execution time"),
        Threshold::new(MAX_INDIVIDUAL_TEST_TIME, "Individual Test Time", 30.0, false, AtMost, "s",
            "Maximum individual test execution time"),
        Threshold::new(PERFORMANCE_REGRESSION, "Performance Regression", 10.0, true, AtMost, "%",
            "Maximum allowed performance regression"),
        Threshold::new(MEMORY_LEAKS, "Memory Leaks", 0.0, true, AtMost, "",
            "Maximum allowed memory leaks"),
        // Security
        Threshold::new(CRITICAL_VULNERABILITIES, "Critical Vulnerabilities", 0.0, true, AtMost, "",
            "Maximum critical security vulnerabilities"),
        Threshold::new(HIGH_VULNERABILITIES, "High Vulnerabilities", 0.0, true, AtMost, "",
            "Maximum high-severity vulnerabilities"),
        Threshold::new(MEDIUM_VULNERABILITIES, "Medium Vulnerabilities", 2.0, false, AtMost, "",
            "Maximum medium-severity vulnerabilities"),
        Threshold::new(SECURITY_TEST_COVERAGE, "Security Test Coverage", 95.0, true, AtLeast, "%",
            "Security-specific test coverage"),
        // Reliability
        Threshold::new(TEST_FLAKY_RATE, "Test Flaky Rate", 2.0, true, AtMost, "%",
            "Maximum percentage of flaky tests"),
        Threshold::new(TEST_FAILURE_RATE, "Test Failure Rate", 0.0, true, AtMost, "%",
            "Maximum test failure rate for non-flaky tests"),
        Threshold::new(CODE_QUALITY_SCORE, "Code Quality Score", 95.0, true, AtLeast, "",
            "Minimum overall code quality score"),
        // API & integration
        Threshold::new(API_RESPONSE_TIME, "API Response Time", 200.0, false, AtMost, "ms",
            "Maximum API endpoint response time"),
        Threshold::new(DATABASE_QUERY_TIME, "Database Query Time", 100.0, false, AtMost, "ms",
            "Maximum database query execution time"),
        Threshold::new(INTEGRATION_TEST_SUCCESS, "Integration Test Success", 100.0, true, AtLeast,
            "%", "Integration test success rate"),
    ]
}

/// Replacement values keyed by threshold name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdOverrides {
    values: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OverrideFile {
    Nested { thresholds: BTreeMap<String, f64> },
    Flat(BTreeMap<String, f64>),
}

impl OverrideFile {
    fn into_overrides(self) -> ThresholdOverrides {
        let values = match self {
            OverrideFile::Nested { thresholds } => thresholds,
            OverrideFile::Flat(values) => values,
        };
        ThresholdOverrides { values }
    }
}

impl ThresholdOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pre-built override set used for strict mode.
    pub fn strict() -> Self {
        Self::new()
            .with(keys::OVERALL_TEST_COVERAGE, 95.0)
            .with(keys::CRITICAL_PATH_COVERAGE, 98.0)
            .with(keys::MAX_TEST_EXECUTION_TIME, 30.0)
            .with(keys::TEST_FLAKY_RATE, 1.0)
    }

    /// Add or replace one override.
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    /// Parse `name=value` pairs, as given on a command line.
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair.split_once('=').ok_or_else(|| {
                GateError::Config(format!("malformed override '{pair}': expected name=value"))
            })?;
            let value: f64 = raw.trim().parse().map_err(|_| {
                GateError::Config(format!("malformed override '{pair}': '{raw}' is not a number"))
            })?;
            overrides.values.insert(key.trim().to_string(), value);
        }
        Ok(overrides)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: OverrideFile = serde_json::from_str(content)
            .map_err(|e| GateError::Config(format!("malformed override file: {e}")))?;
        Ok(file.into_overrides())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: OverrideFile = toml::from_str(content)
            .map_err(|e| GateError::Config(format!("malformed override file: {e}")))?;
        Ok(file.into_overrides())
    }

    /// Load overrides from a `.toml` or `.json` file.
    ///
    /// Accepts either a flat `name = value` table or one nested under
    /// `thresholds`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Combine with `other`; entries in `other` win.
    pub fn merged_with(mut self, other: &ThresholdOverrides) -> Self {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), *value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Immutable set of named thresholds for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRegistry {
    thresholds: BTreeMap<String, Threshold>,
}

impl Default for ThresholdRegistry {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ThresholdRegistry {
    /// Built-in thresholds, no overrides.
    pub fn defaults() -> Self {
        let thresholds = default_thresholds()
            .into_iter()
            .map(|t| (t.key.clone(), t))
            .collect();
        Self { thresholds }
    }

    /// Built-in thresholds with `overrides` applied.
    ///
    /// Either every override applies or none does: an unknown name or an
    /// invalid value fails construction with [`GateError::Config`].
    pub fn with_overrides(overrides: &ThresholdOverrides) -> Result<Self> {
        let mut registry = Self::defaults();
        for (key, value) in overrides.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(GateError::Config(format!(
                    "invalid value {value} for threshold {key}: must be finite and non-negative"
                )));
            }
            let threshold = registry
                .thresholds
                .get_mut(key)
                .ok_or_else(|| GateError::unknown_threshold(key))?;
            debug!(threshold = key, from = threshold.value, to = value, "override applied");
            threshold.value = value;
        }
        info!(overrides = overrides.len(), "threshold registry built");
        Ok(registry)
    }

    /// Strict thresholds, then `overrides` on top.
    pub fn strict(overrides: &ThresholdOverrides) -> Result<Self> {
        Self::with_overrides(&ThresholdOverrides::strict().merged_with(overrides))
    }

    /// Look up a threshold by registry key.
    pub fn get(&self, key: &str) -> Result<&Threshold> {
        self.thresholds
            .get(key)
            .ok_or_else(|| GateError::unknown_threshold(key))
    }

    /// Thresholds in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.thresholds.values()
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_contain_every_key() {
        let registry = ThresholdRegistry::defaults();
        assert_eq!(registry.len(), 18);

        let coverage = registry.get(keys::OVERALL_TEST_COVERAGE).unwrap();
        assert_eq!(coverage.value, 90.0);
        assert!(coverage.critical);
        assert_eq!(coverage.polarity, Polarity::AtLeast);

        let medium = registry.get(keys::MEDIUM_VULNERABILITIES).unwrap();
        assert_eq!(medium.value, 2.0);
        assert!(!medium.critical);
        assert_eq!(medium.polarity, Polarity::AtMost);
    }

    #[test]
    fn test_unknown_threshold_is_config_error() {
        let err = ThresholdRegistry::defaults().get("nope").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = ThresholdOverrides::new().with(keys::API_RESPONSE_TIME, 150.0);
        let registry = ThresholdRegistry::with_overrides(&overrides).unwrap();
        assert_eq!(registry.get(keys::API_RESPONSE_TIME).unwrap().value, 150.0);
        // Criticality and polarity are untouched.
        assert!(!registry.get(keys::API_RESPONSE_TIME).unwrap().critical);
    }

    #[test]
    fn test_unknown_override_fails_whole_construction() {
        let overrides = ThresholdOverrides::new()
            .with(keys::API_RESPONSE_TIME, 150.0)
            .with("made_up_threshold", 1.0);
        let err = ThresholdRegistry::with_overrides(&overrides).unwrap_err();
        assert!(err.to_string().contains("made_up_threshold"));
    }

    #[test]
    fn test_negative_and_non_finite_overrides_rejected() {
        let overrides = ThresholdOverrides::new().with(keys::TEST_FLAKY_RATE, -1.0);
        assert!(ThresholdRegistry::with_overrides(&overrides).is_err());

        let overrides = ThresholdOverrides::new().with(keys::TEST_FLAKY_RATE, f64::NAN);
        assert!(ThresholdRegistry::with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_strict_mode_values() {
        let registry = ThresholdRegistry::strict(&ThresholdOverrides::new()).unwrap();
        assert_eq!(registry.get(keys::OVERALL_TEST_COVERAGE).unwrap().value, 95.0);
        assert_eq!(registry.get(keys::CRITICAL_PATH_COVERAGE).unwrap().value, 98.0);
        assert_eq!(registry.get(keys::MAX_TEST_EXECUTION_TIME).unwrap().value, 30.0);
        assert_eq!(registry.get(keys::TEST_FLAKY_RATE).unwrap().value, 1.0);
    }

    #[test]
    fn test_user_overrides_win_over_strict() {
        let user = ThresholdOverrides::new().with(keys::OVERALL_TEST_COVERAGE, 97.5);
        let registry = ThresholdRegistry::strict(&user).unwrap();
        assert_eq!(registry.get(keys::OVERALL_TEST_COVERAGE).unwrap().value, 97.5);
        assert_eq!(registry.get(keys::CRITICAL_PATH_COVERAGE).unwrap().value, 98.0);
    }

    #[test]
    fn test_parse_pairs() {
        let overrides =
            ThresholdOverrides::parse_pairs(["ui_test_coverage=75", " api_response_time = 250.5"])
                .unwrap();
        let values: Vec<_> = overrides.iter().collect();
        assert_eq!(
            values,
            vec![("api_response_time", 250.5), ("ui_test_coverage", 75.0)]
        );
    }

    #[test]
    fn test_parse_pairs_malformed() {
        assert!(ThresholdOverrides::parse_pairs(["ui_test_coverage"]).is_err());
        assert!(ThresholdOverrides::parse_pairs(["ui_test_coverage=high"]).is_err());
    }

    #[test]
    fn test_override_file_formats() {
        let flat = ThresholdOverrides::from_json_str(r#"{"ui_test_coverage": 70}"#).unwrap();
        assert_eq!(flat.len(), 1);

        let nested =
            ThresholdOverrides::from_json_str(r#"{"thresholds": {"ui_test_coverage": 70}}"#)
                .unwrap();
        assert_eq!(flat, nested);

        let toml = ThresholdOverrides::from_toml_str("[thresholds]\nui_test_coverage = 70.0\n")
            .unwrap();
        assert_eq!(flat, toml);

        assert!(ThresholdOverrides::from_json_str(r#"{"ui_test_coverage": "x"}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gates.toml");
        std::fs::write(&path, "medium_vulnerabilities = 0.0\n").unwrap();

        let overrides = ThresholdOverrides::load(&path).unwrap();
        let registry = ThresholdRegistry::with_overrides(&overrides).unwrap();
        assert_eq!(registry.get(keys::MEDIUM_VULNERABILITIES).unwrap().value, 0.0);
    }
}
