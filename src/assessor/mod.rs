//! External risk assessment capability.
//!
//! The engine depends on assessors only through [`RiskAssessor`]. An engine
//! built without one runs purely on the deterministic rules.

pub mod gemini;

use crate::error::AssessorError;
use async_trait::async_trait;
use serde::Serialize;

pub use gemini::GeminiAssessor;

/// Reason used when no assessor is configured
pub const NOT_AVAILABLE_REASON: &str = "AI assessment not available";
/// Reason used when the assessor errors or times out
pub const FAILED_REASON: &str = "AI assessment failed";

/// Snapshot of the transaction handed to an assessor
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentContext {
    pub amount: f64,
    pub currency: String,
    /// First four characters of the card number, or "Unknown"
    pub card_prefix: String,
    /// Evaluation time, RFC 3339
    pub timestamp: String,
    /// Recent-activity label, e.g. "3 recent transactions"
    pub user_pattern: String,
}

/// Score and explanation returned by an assessor
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Risk score in [0.0, 1.0]
    pub score: f64,
    pub reason: String,
}

impl Assessment {
    /// Build an assessment, clamping the score into [0, 1]. NaN maps to 0.
    pub fn new(score: f64, reason: impl Into<String>) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            score,
            reason: reason.into(),
        }
    }

    pub fn not_available() -> Self {
        Self::new(0.0, NOT_AVAILABLE_REASON)
    }

    pub fn failed() -> Self {
        Self::new(0.0, FAILED_REASON)
    }
}

/// A pluggable source of an additional fraud-risk signal
#[async_trait]
pub trait RiskAssessor: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Assess a single transaction snapshot.
    async fn assess(&self, context: &AssessmentContext) -> Result<Assessment, AssessorError>;
}
