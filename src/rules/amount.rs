//! Amount heuristics

/// Result of checking an amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountCheck {
    pub suspicious: bool,
    pub reason: String,
}

/// Stateless checks on the transaction amount
#[derive(Debug, Clone)]
pub struct AmountHeuristics {
    max_amount: f64,
    suspicious_amounts: Vec<f64>,
}

impl AmountHeuristics {
    pub fn new(max_amount: f64, suspicious_amounts: Vec<f64>) -> Self {
        Self {
            max_amount,
            suspicious_amounts,
        }
    }

    /// Flag non-positive amounts, amounts over the ceiling and known decoy amounts.
    pub fn check(&self, amount: f64) -> AmountCheck {
        if amount <= 0.0 {
            return AmountCheck {
                suspicious: true,
                reason: "Invalid amount".to_string(),
            };
        }

        if amount > self.max_amount {
            return AmountCheck {
                suspicious: true,
                reason: format!("Amount too high: ${:.2}", amount),
            };
        }

        // Exact match only
        if self.suspicious_amounts.iter().any(|&decoy| decoy == amount) {
            return AmountCheck {
                suspicious: true,
                reason: format!("Suspicious amount pattern: ${:.2}", amount),
            };
        }

        AmountCheck {
            suspicious: false,
            reason: "Amount check passed".to_string(),
        }
    }
}

impl Default for AmountHeuristics {
    fn default() -> Self {
        Self::new(10_000.0, vec![9999.99, 5000.00, 1000.00])
    }
}
