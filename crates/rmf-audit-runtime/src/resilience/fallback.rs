//! Why an evaluation fell back to the keyword heuristic.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    CircuitOpen,
    BudgetExhausted,
    Timeout,
    Provider(String),
    InvalidJudgment(String),
}

impl FallbackReason {
    /// Whether the failure counts against the category's circuit.
    pub fn trips_circuit(&self) -> bool {
        matches!(
            self,
            FallbackReason::Timeout | FallbackReason::Provider(_) | FallbackReason::InvalidJudgment(_)
        )
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::CircuitOpen => write!(f, "circuit open"),
            FallbackReason::BudgetExhausted => write!(f, "token budget exhausted"),
            FallbackReason::Timeout => write!(f, "model call timed out"),
            FallbackReason::Provider(e) => write!(f, "provider error: {}", e),
            FallbackReason::InvalidJudgment(e) => write!(f, "unusable model output: {}", e),
        }
    }
}
