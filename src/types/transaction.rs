//! Transaction data structures: the wire request and the validated domain form

use crate::error::{EvaluationError, EvaluationResult};
use serde::{Deserialize, Serialize};

/// User id used when the request carries none
pub const ANONYMOUS_USER: &str = "anonymous";

/// Monetary amount as sent on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    /// Whole currency units
    pub units: i64,
    /// Nano units (10^-9) of the amount, same sign as `units`
    #[serde(default)]
    pub nanos: i32,
    /// ISO 4217 currency tag
    #[serde(default = "default_currency")]
    pub currency_code: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Money {
    pub fn new(units: i64, nanos: i32, currency_code: &str) -> Self {
        Self {
            units,
            nanos,
            currency_code: currency_code.to_string(),
        }
    }

    /// Reconstruct the amount as `units + nanos / 1e9`.
    pub fn to_amount(&self) -> EvaluationResult<f64> {
        let nanos_out_of_range = self.nanos.unsigned_abs() > 999_999_999;
        let sign_mismatch =
            (self.units > 0 && self.nanos < 0) || (self.units < 0 && self.nanos > 0);

        if nanos_out_of_range || sign_mismatch {
            return Err(EvaluationError::MalformedAmount {
                units: self.units,
                nanos: self.nanos,
            });
        }

        Ok(self.units as f64 + self.nanos as f64 / 1e9)
    }
}

/// Credit card details as sent on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreditCardInfo {
    #[serde(default)]
    pub credit_card_number: Option<String>,
    #[serde(default)]
    pub credit_card_expiration_month: i32,
    #[serde(default)]
    pub credit_card_expiration_year: i32,
    #[serde(default)]
    pub credit_card_cvv: Option<i32>,
}

/// Fraud check request received on the request subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub amount: Money,
    #[serde(default)]
    pub credit_card: CreditCardInfo,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Card supplied with a transaction; never retained
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub number: Option<String>,
    pub expiration_month: i32,
    pub expiration_year: i32,
    pub cvv: Option<i32>,
}

impl Card {
    pub fn new(number: &str, expiration_month: i32, expiration_year: i32) -> Self {
        Self {
            number: Some(number.to_string()),
            expiration_month,
            expiration_year,
            cvv: None,
        }
    }

    /// First four characters of the number, or "Unknown"
    pub fn prefix(&self) -> String {
        match self.number.as_deref() {
            Some(number) if !number.is_empty() => number.chars().take(4).collect(),
            _ => "Unknown".to_string(),
        }
    }
}

impl From<CreditCardInfo> for Card {
    fn from(info: CreditCardInfo) -> Self {
        Self {
            number: info.credit_card_number,
            expiration_month: info.credit_card_expiration_month,
            expiration_year: info.credit_card_expiration_year,
            cvv: info.credit_card_cvv,
        }
    }
}

/// A payment transaction to be evaluated
#[derive(Debug, Clone)]
pub struct Transaction {
    pub amount: f64,
    pub currency: String,
    pub card: Card,
    pub user_id: String,
}

impl Transaction {
    /// Create a new transaction; an empty user id maps to the anonymous user
    pub fn new(amount: f64, currency: &str, card: Card, user_id: &str) -> Self {
        let user_id = if user_id.is_empty() {
            ANONYMOUS_USER
        } else {
            user_id
        };

        Self {
            amount,
            currency: currency.to_string(),
            card,
            user_id: user_id.to_string(),
        }
    }
}

impl TryFrom<CheckRequest> for Transaction {
    type Error = EvaluationError;

    fn try_from(request: CheckRequest) -> EvaluationResult<Self> {
        let amount = request.amount.to_amount()?;
        let user_id = request.user_id.unwrap_or_default();

        Ok(Transaction::new(
            amount,
            &request.amount.currency_code,
            request.credit_card.into(),
            &user_id,
        ))
    }
}
