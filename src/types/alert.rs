//! Fraud alert data structures

use crate::types::decision::Decision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from score and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.7,
            critical: 0.9,
        }
    }
}

/// Alert published for every blocked transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier
    pub alert_id: String,

    /// User the transaction belonged to
    pub user_id: String,

    /// Transaction amount and currency
    pub amount: f64,
    pub currency: String,

    /// Final risk score (0.0 - 1.0)
    pub risk_score: f64,

    /// Risk level classification
    pub risk_level: RiskLevel,

    /// Reason from the decision
    pub reason: String,

    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl FraudAlert {
    /// Build an alert from a blocked decision
    pub fn from_decision(
        user_id: &str,
        amount: f64,
        currency: &str,
        decision: &Decision,
        thresholds: &RiskLevelThresholds,
    ) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            currency: currency.to_string(),
            risk_score: decision.risk_score,
            risk_level: RiskLevel::from_score(decision.risk_score, thresholds),
            reason: decision.reason.clone(),
            timestamp: Utc::now(),
        }
    }
}
