//! Per-plan execution lifecycle.
//!
//! ```text
//! Pending -> Building -> BuildFailed                      (terminal)
//!                     -> Testing -> TimedOut              (terminal)
//!                                -> Completed             (terminal)
//! {BuildFailed, TimedOut, Completed} -> Validated
//! ```
//!
//! `Pending -> Testing` is allowed for executors without a build phase (or
//! when a shared build already ran). Any non-terminal state may move to
//! `TimedOut` when the overall run budget is exhausted.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{GateError, Result};

/// Lifecycle state of a single test plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Pending,
    Building,
    BuildFailed,
    Testing,
    TimedOut,
    Completed,
    Validated,
}

impl PlanState {
    /// Whether execution has settled (validation may begin).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::BuildFailed | Self::TimedOut | Self::Completed)
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(self, next: PlanState) -> Result<PlanState> {
        use PlanState::*;

        let allowed = match (self, next) {
            (Pending, Building) | (Pending, Testing) => true,
            (Building, BuildFailed) | (Building, Testing) => true,
            (Testing, Completed) => true,
            (Pending | Building | Testing, TimedOut) => true,
            (from, Validated) => from.is_terminal(),
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(GateError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::BuildFailed => "build_failed",
            Self::Testing => "testing",
            Self::TimedOut => "timed_out",
            Self::Completed => "completed",
            Self::Validated => "validated",
        }
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
