//! Structural and expiry validation of payment cards.
//!
//! Only the card-network checksum is verified; nothing here talks to an issuer.

use crate::types::transaction::Card;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

const MIN_CARD_LENGTH: usize = 13;
const MAX_CARD_LENGTH: usize = 19;

/// Result of validating a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCheck {
    pub valid: bool,
    pub reason: String,
}

impl CardCheck {
    fn valid() -> Self {
        Self {
            valid: true,
            reason: "Valid".to_string(),
        }
    }

    fn invalid(reason: &str) -> Self {
        Self {
            valid: false,
            reason: reason.to_string(),
        }
    }
}

/// Stateless card validator
#[derive(Debug, Clone, Copy, Default)]
pub struct CardValidator;

impl CardValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate number structure, Luhn checksum and expiration at `now`.
    pub fn validate(&self, card: &Card, now: DateTime<Utc>) -> CardCheck {
        let number = match card.number.as_deref() {
            Some(number) if !number.is_empty() => number,
            _ => return CardCheck::invalid("Missing credit card number"),
        };

        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();

        if !(MIN_CARD_LENGTH..=MAX_CARD_LENGTH).contains(&digits.len()) {
            return CardCheck::invalid("Invalid credit card number length");
        }

        if !luhn_valid(&digits) {
            return CardCheck::invalid("Invalid credit card number");
        }

        self.validate_expiration(card.expiration_month, card.expiration_year, now)
    }

    fn validate_expiration(&self, month: i32, year: i32, now: DateTime<Utc>) -> CardCheck {
        if !(1..=12).contains(&month) {
            return CardCheck::invalid("Invalid expiration month");
        }

        let expiration = match first_of_month(year, month as u32) {
            Some(date) => date,
            None => return CardCheck::invalid("Invalid expiration date"),
        };

        // Cards stay usable through their expiration month
        let current_month = match first_of_month(now.year(), now.month()) {
            Some(date) => date,
            None => return CardCheck::invalid("Invalid expiration date"),
        };

        if expiration < current_month {
            return CardCheck::invalid("Credit card expired");
        }

        CardCheck::valid()
    }
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Luhn checksum over an ASCII digit string.
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;

    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const VALID_NUMBERS: [&str; 5] = [
        "4532015112830366",
        "4111111111111111",
        "5555555555554444",
        "378282246310005",
        "6011111111111117",
    ];

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_valid_card() {
        let validator = CardValidator::new();
        let check = validator.validate(&Card::new("4532015112830366", 12, 2030), now());

        assert!(check.valid);
        assert_eq!(check.reason, "Valid");
    }

    #[test]
    fn test_luhn_accepts_known_numbers() {
        for number in VALID_NUMBERS {
            assert!(luhn_valid(number), "{number} should pass");
        }
    }

    #[test]
    fn test_single_digit_perturbation_fails() {
        let validator = CardValidator::new();

        for number in VALID_NUMBERS {
            for pos in 0..number.len() {
                let original = number.as_bytes()[pos];
                for replacement in b'0'..=b'9' {
                    if replacement == original {
                        continue;
                    }
                    let mut bytes = number.as_bytes().to_vec();
                    bytes[pos] = replacement;
                    let perturbed = String::from_utf8(bytes).unwrap();

                    let check = validator.validate(&Card::new(&perturbed, 12, 2030), now());
                    assert!(!check.valid, "{perturbed} should fail");
                    assert_eq!(check.reason, "Invalid credit card number");
                }
            }
        }
    }

    #[test]
    fn test_non_digits_are_stripped() {
        let validator = CardValidator::new();
        let check = validator.validate(&Card::new("4532-0151 1283-0366", 12, 2030), now());
        assert!(check.valid);
    }

    #[test]
    fn test_invalid_luhn() {
        let validator = CardValidator::new();
        let check = validator.validate(&Card::new("1234567890123456", 12, 2030), now());

        assert!(!check.valid);
        assert!(check.reason.contains("Invalid credit card number"));
    }

    #[test]
    fn test_missing_number() {
        let validator = CardValidator::new();
        let card = Card {
            number: None,
            ..Card::default()
        };

        assert_eq!(
            validator.validate(&card, now()).reason,
            "Missing credit card number"
        );
        assert_eq!(
            validator.validate(&Card::new("", 12, 2030), now()).reason,
            "Missing credit card number"
        );
    }

    #[test]
    fn test_length_bounds() {
        let validator = CardValidator::new();

        let short = validator.validate(&Card::new("424242424242", 12, 2030), now());
        assert_eq!(short.reason, "Invalid credit card number length");

        let long = validator.validate(&Card::new("42424242424242424242", 12, 2030), now());
        assert_eq!(long.reason, "Invalid credit card number length");
    }

    #[test]
    fn test_expired_card() {
        let validator = CardValidator::new();
        let check = validator.validate(&Card::new("4532015112830366", 1, 2020), now());

        assert!(!check.valid);
        assert!(check.reason.to_lowercase().contains("expired"));
    }

    #[test]
    fn test_current_and_next_month_valid() {
        let validator = CardValidator::new();

        assert!(validator.validate(&Card::new("4532015112830366", 10, 2026), now()).valid);
        assert!(validator.validate(&Card::new("4532015112830366", 11, 2026), now()).valid);
        assert!(!validator.validate(&Card::new("4532015112830366", 9, 2026), now()).valid);
    }

    #[test]
    fn test_invalid_month() {
        let validator = CardValidator::new();

        for month in [0, 13, -1] {
            let check = validator.validate(&Card::new("4532015112830366", month, 2030), now());
            assert_eq!(check.reason, "Invalid expiration month");
        }
    }

    #[test]
    fn test_unrepresentable_year() {
        let validator = CardValidator::new();
        let check = validator.validate(&Card::new("4532015112830366", 6, i32::MAX), now());
        assert_eq!(check.reason, "Invalid expiration date");
    }
}
