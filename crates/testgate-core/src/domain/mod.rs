//! Domain models for testgate.
//!
//! Canonical definitions for the core entities:
//! - `Threshold`: a named, immutable quality limit
//! - `ValidationResult`: outcome of one gate check
//! - `TestPlanResult`: outcome of one test plan execution
//! - `ValidationReport`: the aggregate verdict of a run

pub mod error;
pub mod metrics;
pub mod report;
pub mod result;
pub mod state;
pub mod threshold;

// Re-export main types and errors
pub use error::{GateError, Result};
pub use metrics::{percentage, rate_denominator, CoverageData, ResourceUsage, TestCounts};
pub use report::{GateSummary, ValidationReport};
pub use result::{Severity, TestPlanResult, ValidationResult};
pub use state::PlanState;
pub use threshold::{Polarity, Threshold};
