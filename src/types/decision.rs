//! Evaluation outcome returned to the caller

use serde::{Deserialize, Serialize};

/// Reason reported when an evaluation fails internally
pub const FAIL_CLOSED_REASON: &str = "system error - transaction blocked for safety";

/// Block/allow decision for a single transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the transaction should be blocked
    pub is_fraud: bool,
    /// Aggregated risk score (0.0 - 1.0)
    pub risk_score: f64,
    /// Rule findings joined with "; ", or the assessor's reason
    pub reason: String,
}

impl Decision {
    pub fn new(is_fraud: bool, risk_score: f64, reason: String) -> Self {
        Self {
            is_fraud,
            risk_score: risk_score.clamp(0.0, 1.0),
            reason,
        }
    }

    /// Decision used whenever evaluation could not complete
    pub fn fail_closed() -> Self {
        Self {
            is_fraud: true,
            risk_score: 1.0,
            reason: FAIL_CLOSED_REASON.to_string(),
        }
    }
}
