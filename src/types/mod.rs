//! Type definitions for the fraud risk engine

pub mod alert;
pub mod decision;
pub mod transaction;

pub use alert::{FraudAlert, RiskLevel, RiskLevelThresholds};
pub use decision::Decision;
pub use transaction::{Card, CheckRequest, CreditCardInfo, Money, Transaction};
