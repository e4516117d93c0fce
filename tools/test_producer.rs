//! Test Request Producer
//!
//! Sends randomized fraud check requests over NATS request/reply and logs
//! the decisions that come back.

use chrono::{Datelike, Utc};
use fraud_risk_engine::types::{CheckRequest, CreditCardInfo, Decision, Money};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Card numbers that pass the Luhn checksum
const VALID_CARDS: [&str; 4] = [
    "4532015112830366",
    "4111111111111111",
    "5555555555554444",
    "378282246310005",
];

/// Generator for legitimate-looking and suspicious requests
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
    users: u32,
}

impl RequestGenerator {
    fn new(users: u32) -> Self {
        Self {
            rng: rand::thread_rng(),
            users: users.max(1),
        }
    }

    fn card(&mut self, number: &str, expiration_year: i32) -> CreditCardInfo {
        CreditCardInfo {
            credit_card_number: Some(number.to_string()),
            credit_card_expiration_month: self.rng.gen_range(1..=12),
            credit_card_expiration_year: expiration_year,
            credit_card_cvv: Some(self.rng.gen_range(100..1000)),
        }
    }

    fn user(&mut self) -> String {
        format!("user-{}", self.rng.gen_range(0..self.users))
    }

    /// Small amount, valid card, future expiry
    fn generate_legitimate(&mut self) -> CheckRequest {
        let number = self.random_choice(&VALID_CARDS);
        let year = Utc::now().year() + self.rng.gen_range(1..5);

        CheckRequest {
            amount: Money::new(
                self.rng.gen_range(5..500),
                self.rng.gen_range(0..100) * 10_000_000,
                *self.random_choice::<&str>(&["USD", "EUR", "GBP", "CAD"]),
            ),
            credit_card: self.card(number, year),
            user_id: Some(self.user()),
        }
    }

    /// Trips at least one rule
    fn generate_suspicious(&mut self) -> CheckRequest {
        let mut request = self.generate_legitimate();

        match self.rng.gen_range(0..4) {
            // Luhn failure
            0 => {
                request.credit_card.credit_card_number = Some("1234567890123456".to_string());
            }
            // Expired card
            1 => request.credit_card.credit_card_expiration_year = 2020,
            // Decoy amount
            2 => {
                let (units, nanos) = *self.random_choice(&[(9999, 990_000_000), (5000, 0), (1000, 0)]);
                request.amount = Money::new(units, nanos, "USD");
            }
            // Over the ceiling
            _ => request.amount = Money::new(self.rng.gen_range(10_001..50_000), 0, "USD"),
        }

        request
    }

    fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Request Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("fraud.check");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let users: u32 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(20);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        users = users,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms, users).await;
        }
    };

    let mut generator = RequestGenerator::new(users);
    let mut rng = rand::thread_rng();

    let mut blocked = 0u64;
    let mut allowed = 0u64;
    let mut failed = 0u64;

    for i in 0..count {
        let request = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => match serde_json::from_slice::<Decision>(&reply.payload) {
                Ok(decision) if decision.is_fraud => {
                    blocked += 1;
                    info!(
                        user_id = ?request.user_id,
                        risk_score = decision.risk_score,
                        reason = %decision.reason,
                        "Blocked"
                    );
                }
                Ok(_) => allowed += 1,
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "Unreadable decision");
                }
            },
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Fraud check request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} requests ({} allowed, {} blocked, {} failed)",
                i + 1,
                count,
                allowed,
                blocked,
                failed
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} allowed, {} blocked, {} failed)",
        count, allowed, blocked, failed
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64, users: u32) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RequestGenerator::new(users);
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let request = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
