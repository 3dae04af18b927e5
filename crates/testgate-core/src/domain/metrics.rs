//! Raw metric records produced by executors.
//!
//! These are already-extracted numbers; parsing tool output into them is the
//! executor's job.

use serde::{Deserialize, Serialize};

/// `numerator / denominator * 100`, or `0.0` when the denominator is zero.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// Denominator for rate calculations: a total of zero counts as one.
pub fn rate_denominator(total: u64) -> u64 {
    total.max(1)
}

/// Line coverage for one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageData {
    pub covered_lines: u64,
    pub executable_lines: u64,
}

impl CoverageData {
    /// Covered percentage; `0.0` with no executable lines.
    pub fn percentage(&self) -> f64 {
        percentage(self.covered_lines as f64, self.executable_lines as f64)
    }
}

/// Test case counts for one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl TestCounts {
    /// Passed / total as a fraction in `0.0..=1.0`.
    pub fn success_rate(&self) -> f64 {
        self.passed as f64 / rate_denominator(self.total) as f64
    }

    /// Failed / total as a percentage.
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failed as f64, rate_denominator(self.total) as f64)
    }
}

/// Resource consumption observed while running a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}
