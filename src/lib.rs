//! Fraud Risk Engine Library
//!
//! Decides whether a payment transaction should be blocked by combining
//! card validation, amount heuristics and per-user velocity tracking with an
//! optional external risk assessment.

pub mod assessor;
pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod rules;
pub mod scorer;
pub mod types;
pub mod velocity;

pub use assessor::{Assessment, AssessmentContext, RiskAssessor};
pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{AssessorError, EvaluationError};
pub use producer::DecisionPublisher;
pub use scorer::{Evaluation, RiskScorer};
pub use types::{CheckRequest, Decision, FraudAlert, Transaction};
pub use velocity::VelocityTracker;
