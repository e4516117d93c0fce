//! Error types for the fraud risk engine

use thiserror::Error;

/// Internal failures inside an evaluation. Any of these makes the
/// orchestrator return the fail-closed decision.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Money could not be decomposed into a single amount
    #[error("malformed amount: units={units}, nanos={nanos}")]
    MalformedAmount { units: i64, nanos: i32 },

    /// Amount is NaN or infinite
    #[error("amount is not a finite number")]
    NonFiniteAmount,

    /// A per-user history lock was poisoned by a panicking holder
    #[error("velocity state poisoned for user {0}")]
    StatePoisoned(String),

    /// A tracking window reaches past the representable time range
    #[error("window of {0} s is out of range")]
    WindowOutOfRange(i64),
}

/// Failures of the external risk assessor. These never reach the caller;
/// the orchestrator absorbs them as a zero contribution.
#[derive(Debug, Error)]
pub enum AssessorError {
    #[error("assessor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("assessor returned status {0}")]
    Status(u16),

    #[error("assessor returned no content")]
    EmptyResponse,

    #[error("assessor timed out after {0} ms")]
    Timeout(u64),
}

pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;
