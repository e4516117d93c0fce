//! Risk scoring orchestrator.
//!
//! Runs the rule checks, asks the optional assessor for an extra signal and
//! folds everything into a single [`Decision`].
//!
//! Blocking policy: any rule finding blocks the transaction regardless of the
//! numeric score. The assessor can only raise the score; on its own it blocks
//! only if the aggregate crosses the block threshold.
//!
//! The velocity check and the record of an allowed transaction are separate
//! critical sections with the assessor call in between. Two concurrent
//! evaluations for the same user can therefore both pass a velocity check
//! that a strictly sequential pair would not.

use crate::assessor::{Assessment, AssessmentContext, GeminiAssessor, RiskAssessor};
use crate::config::{AppConfig, DetectionConfig, ScoreWeights};
use crate::error::{AssessorError, EvaluationError, EvaluationResult};
use crate::rules::{AmountHeuristics, CardValidator};
use crate::types::decision::Decision;
use crate::types::transaction::{CheckRequest, Transaction};
use crate::velocity::VelocityTracker;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How the assessor contributed to an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessorOutcome {
    /// No assessor configured
    Unavailable,
    Completed,
    Failed,
    TimedOut,
}

impl AssessorOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessorOutcome::Unavailable => "unavailable",
            AssessorOutcome::Completed => "completed",
            AssessorOutcome::Failed => "failed",
            AssessorOutcome::TimedOut => "timed_out",
        }
    }
}

/// Decision plus how it was reached
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// None when evaluation failed before the assessor was consulted
    pub assessor: Option<AssessorOutcome>,
    pub fail_closed: bool,
}

impl Evaluation {
    /// Evaluation for a request that could not be evaluated at all
    pub fn fail_closed() -> Self {
        Self {
            decision: Decision::fail_closed(),
            assessor: None,
            fail_closed: true,
        }
    }
}

/// Window length in seconds; lengths chrono cannot represent saturate so the
/// tracker reports them as out of range instead of panicking.
fn window(secs: i64) -> chrono::Duration {
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
}

/// Combines rule checks, velocity tracking and the assessor into a decision
pub struct RiskScorer {
    card_validator: CardValidator,
    amount_heuristics: AmountHeuristics,
    velocity: VelocityTracker,
    assessor: Option<Arc<dyn RiskAssessor>>,
    weights: ScoreWeights,
    block_threshold: f64,
    assessor_timeout: Duration,
}

impl RiskScorer {
    /// Create a scorer from detection settings and an optional assessor
    pub fn new(
        detection: &DetectionConfig,
        assessor: Option<Arc<dyn RiskAssessor>>,
        assessor_timeout: Duration,
    ) -> Self {
        let velocity = VelocityTracker::new(
            detection.velocity_threshold,
            detection.daily_limit,
            window(detection.velocity_window_secs),
            window(detection.daily_window_secs),
        );

        Self {
            card_validator: CardValidator::new(),
            amount_heuristics: AmountHeuristics::new(
                detection.max_amount_threshold,
                detection.suspicious_amounts.clone(),
            ),
            velocity,
            assessor,
            weights: detection.weights.clone(),
            block_threshold: detection.block_threshold,
            assessor_timeout,
        }
    }

    /// Scorer that never consults an assessor
    pub fn rule_based(detection: &DetectionConfig) -> Self {
        Self::new(detection, None, Duration::ZERO)
    }

    /// Build from application config, wiring the Gemini assessor when an API key is set
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let assessor: Option<Arc<dyn RiskAssessor>> =
            match GeminiAssessor::from_config(&config.assessor)? {
                Some(gemini) => Some(Arc::new(gemini)),
                None => {
                    info!("No assessor API key set, using rule-based fraud detection only");
                    None
                }
            };

        Ok(Self::new(
            &config.detection,
            assessor,
            Duration::from_millis(config.assessor.timeout_ms),
        ))
    }

    pub fn velocity(&self) -> &VelocityTracker {
        &self.velocity
    }

    pub fn has_assessor(&self) -> bool {
        self.assessor.is_some()
    }

    /// Evaluate a transaction. Never fails; internal errors block.
    pub async fn evaluate(&self, tx: &Transaction, now: DateTime<Utc>) -> Decision {
        self.evaluate_detailed(tx, now).await.decision
    }

    /// Evaluate a wire request, failing closed if its amount is malformed.
    pub async fn evaluate_request(&self, request: CheckRequest, now: DateTime<Utc>) -> Evaluation {
        match Transaction::try_from(request) {
            Ok(tx) => self.evaluate_detailed(&tx, now).await,
            Err(e) => {
                error!(error = %e, "Rejecting malformed fraud check request");
                Evaluation::fail_closed()
            }
        }
    }

    /// Evaluate a transaction and report how the assessor contributed.
    pub async fn evaluate_detailed(&self, tx: &Transaction, now: DateTime<Utc>) -> Evaluation {
        info!(
            user_id = %tx.user_id,
            amount = tx.amount,
            currency = %tx.currency,
            "Fraud check"
        );

        match self.try_evaluate(tx, now).await {
            Ok(evaluation) => {
                info!(
                    user_id = %tx.user_id,
                    is_fraud = evaluation.decision.is_fraud,
                    risk_score = evaluation.decision.risk_score,
                    reason = %evaluation.decision.reason,
                    "Fraud result"
                );
                evaluation
            }
            Err(e) => {
                error!(
                    user_id = %tx.user_id,
                    error = %e,
                    "Error in fraud detection, blocking transaction"
                );
                Evaluation::fail_closed()
            }
        }
    }

    async fn try_evaluate(
        &self,
        tx: &Transaction,
        now: DateTime<Utc>,
    ) -> EvaluationResult<Evaluation> {
        if !tx.amount.is_finite() {
            return Err(EvaluationError::NonFiniteAmount);
        }

        let mut reasons: Vec<String> = Vec::new();
        let mut score = 0.0;

        let card = self.card_validator.validate(&tx.card, now);
        if !card.valid {
            reasons.push(card.reason);
            score += self.weights.card;
        }

        let amount = self.amount_heuristics.check(tx.amount);
        if amount.suspicious {
            reasons.push(amount.reason);
            score += self.weights.amount;
        }

        let velocity = self.velocity.check(&tx.user_id, tx.amount, now)?;
        if velocity.suspicious {
            reasons.push(velocity.reason);
            score += self.weights.velocity;
        }

        let context = AssessmentContext {
            amount: tx.amount,
            currency: tx.currency.clone(),
            card_prefix: tx.card.prefix(),
            timestamp: now.to_rfc3339(),
            user_pattern: format!("{} recent transactions", velocity.recent_count),
        };
        let (assessment, outcome) = self.assess(&context).await;
        score += assessment.score * self.weights.assessor;

        let risk_score = score.clamp(0.0, 1.0);
        let is_fraud = risk_score > self.block_threshold || !reasons.is_empty();

        let reason = if reasons.is_empty() {
            assessment.reason
        } else {
            reasons.join("; ")
        };

        if !is_fraud {
            self.velocity.record(&tx.user_id, tx.amount, now)?;
        }

        Ok(Evaluation {
            decision: Decision::new(is_fraud, risk_score, reason),
            assessor: Some(outcome),
            fail_closed: false,
        })
    }

    /// Consult the assessor once, absorbing every failure.
    async fn assess(&self, context: &AssessmentContext) -> (Assessment, AssessorOutcome) {
        let Some(assessor) = &self.assessor else {
            return (Assessment::not_available(), AssessorOutcome::Unavailable);
        };

        match tokio::time::timeout(self.assessor_timeout, assessor.assess(context)).await {
            Ok(Ok(assessment)) => {
                debug!(
                    assessor = assessor.name(),
                    score = assessment.score,
                    "Assessment completed"
                );
                let assessment = Assessment::new(assessment.score, assessment.reason);
                (assessment, AssessorOutcome::Completed)
            }
            Ok(Err(e)) => {
                warn!(assessor = assessor.name(), error = %e, "AI fraud assessment failed");
                (Assessment::failed(), AssessorOutcome::Failed)
            }
            Err(_) => {
                let e = AssessorError::Timeout(self.assessor_timeout.as_millis() as u64);
                warn!(assessor = assessor.name(), error = %e, "AI fraud assessment timed out");
                (Assessment::failed(), AssessorOutcome::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decision::FAIL_CLOSED_REASON;
    use crate::types::transaction::{Card, CreditCardInfo, Money};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    const VALID_CARD: &str = "4532015112830366";

    struct StaticAssessor {
        score: f64,
        reason: &'static str,
        calls: AtomicUsize,
    }

    impl StaticAssessor {
        fn new(score: f64, reason: &'static str) -> Arc<Self> {
            Arc::new(Self {
                score,
                reason,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RiskAssessor for StaticAssessor {
        fn name(&self) -> &str {
            "static"
        }

        async fn assess(&self, _context: &AssessmentContext) -> Result<Assessment, AssessorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Assessment::new(self.score, self.reason))
        }
    }

    struct FailingAssessor;

    #[async_trait]
    impl RiskAssessor for FailingAssessor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn assess(&self, _context: &AssessmentContext) -> Result<Assessment, AssessorError> {
            Err(AssessorError::Status(503))
        }
    }

    struct SlowAssessor;

    #[async_trait]
    impl RiskAssessor for SlowAssessor {
        fn name(&self) -> &str {
            "slow"
        }

        async fn assess(&self, _context: &AssessmentContext) -> Result<Assessment, AssessorError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Assessment::new(1.0, "too late"))
        }
    }

    /// Holds every caller until `parties` evaluations are inside the assessor
    struct GateAssessor {
        barrier: Barrier,
    }

    #[async_trait]
    impl RiskAssessor for GateAssessor {
        fn name(&self) -> &str {
            "gate"
        }

        async fn assess(&self, _context: &AssessmentContext) -> Result<Assessment, AssessorError> {
            self.barrier.wait().await;
            Ok(Assessment::new(0.0, "Low risk"))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn scorer_with(assessor: Arc<dyn RiskAssessor>) -> RiskScorer {
        RiskScorer::new(
            &DetectionConfig::default(),
            Some(assessor),
            Duration::from_millis(100),
        )
    }

    fn transaction(amount: f64, number: &str, user: &str) -> Transaction {
        Transaction::new(amount, "USD", Card::new(number, 12, 2030), user)
    }

    #[tokio::test]
    async fn test_legitimate_transaction_is_recorded() {
        let scorer = scorer_with(StaticAssessor::new(0.1, "Low risk"));
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        assert!(!decision.is_fraud);
        assert!(decision.risk_score < 0.7);
        assert!((decision.risk_score - 0.03).abs() < 1e-9);
        assert_eq!(decision.reason, "Low risk");

        let events = scorer.velocity().events("test-user").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, 100.0);
        assert_eq!(events[0].timestamp, now());

        let check = scorer.velocity().check("test-user", 1.0, now()).unwrap();
        assert_eq!(check.recent_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_card_is_fraud() {
        let scorer = scorer_with(StaticAssessor::new(0.1, "Low risk"));
        let tx = transaction(100.0, "1234567890123456", "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        assert!(decision.is_fraud);
        assert!(decision.risk_score > 0.7);
        assert!(decision.reason.contains("Invalid credit card number"));
        assert!(scorer.velocity().events("test-user").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rule_finding_blocks_below_threshold() {
        let scorer = RiskScorer::rule_based(&DetectionConfig::default());
        let tx = transaction(15_000.0, VALID_CARD, "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        // 0.6 alone is under the threshold, the finding still blocks
        assert!(decision.is_fraud);
        assert!((decision.risk_score - 0.6).abs() < 1e-9);
        assert_eq!(decision.reason, "Amount too high: $15000.00");
    }

    #[tokio::test]
    async fn test_multiple_reasons_are_joined_and_score_clamped() {
        let scorer = RiskScorer::rule_based(&DetectionConfig::default());
        let tx = transaction(9999.99, "1234567890123456", "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        assert!(decision.is_fraud);
        assert_eq!(decision.risk_score, 1.0);
        assert_eq!(
            decision.reason,
            "Invalid credit card number; Suspicious amount pattern: $9999.99"
        );
    }

    #[tokio::test]
    async fn test_assessor_alone_cannot_block_with_default_weights() {
        let assessor = StaticAssessor::new(1.0, "Unusual merchant pattern");
        let scorer = scorer_with(assessor.clone());
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        assert!(!decision.is_fraud);
        assert!((decision.risk_score - 0.3).abs() < 1e-9);
        assert_eq!(decision.reason, "Unusual merchant pattern");
        assert_eq!(assessor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_heavy_assessor_weight_can_block() {
        let detection = DetectionConfig {
            weights: ScoreWeights {
                assessor: 1.0,
                ..ScoreWeights::default()
            },
            ..DetectionConfig::default()
        };
        let scorer = RiskScorer::new(
            &detection,
            Some(StaticAssessor::new(0.9, "Known mule pattern")),
            Duration::from_millis(100),
        );
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        assert!(decision.is_fraud);
        assert_eq!(decision.reason, "Known mule pattern");
        assert!(scorer.velocity().events("test-user").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_assessor() {
        let scorer = RiskScorer::rule_based(&DetectionConfig::default());
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let evaluation = scorer.evaluate_detailed(&tx, now()).await;

        assert!(!evaluation.decision.is_fraud);
        assert_eq!(evaluation.decision.risk_score, 0.0);
        assert_eq!(evaluation.decision.reason, "AI assessment not available");
        assert_eq!(evaluation.assessor, Some(AssessorOutcome::Unavailable));
    }

    #[tokio::test]
    async fn test_failing_assessor_is_absorbed() {
        let scorer = scorer_with(Arc::new(FailingAssessor));
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let evaluation = scorer.evaluate_detailed(&tx, now()).await;

        assert!(!evaluation.decision.is_fraud);
        assert_eq!(evaluation.decision.risk_score, 0.0);
        assert_eq!(evaluation.decision.reason, "AI assessment failed");
        assert_eq!(evaluation.assessor, Some(AssessorOutcome::Failed));
    }

    #[tokio::test]
    async fn test_slow_assessor_times_out() {
        let scorer = scorer_with(Arc::new(SlowAssessor));
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let evaluation = scorer.evaluate_detailed(&tx, now()).await;

        assert_eq!(evaluation.decision.reason, "AI assessment failed");
        assert_eq!(evaluation.decision.risk_score, 0.0);
        assert_eq!(evaluation.assessor, Some(AssessorOutcome::TimedOut));
        assert_eq!(scorer.velocity().events("test-user").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_velocity_blocks_after_threshold() {
        let scorer = RiskScorer::rule_based(&DetectionConfig::default());

        for i in 0..5 {
            let at = now() + chrono::Duration::seconds(i);
            let decision = scorer.evaluate(&transaction(20.0, VALID_CARD, "burst"), at).await;
            assert!(!decision.is_fraud, "transaction {i} should pass");
        }

        let at = now() + chrono::Duration::seconds(10);
        let decision = scorer.evaluate(&transaction(20.0, VALID_CARD, "burst"), at).await;
        assert!(decision.is_fraud);
        assert_eq!(decision.reason, "Too many transactions: 5 in last minute");
        assert_eq!(scorer.velocity().events("burst").unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_non_finite_amount_fails_closed() {
        let scorer = scorer_with(StaticAssessor::new(0.1, "Low risk"));
        let tx = transaction(f64::NAN, VALID_CARD, "test-user");

        let decision = scorer.evaluate(&tx, now()).await;

        assert_eq!(
            decision,
            Decision {
                is_fraud: true,
                risk_score: 1.0,
                reason: FAIL_CLOSED_REASON.to_string(),
            }
        );
        assert!(scorer.velocity().events("test-user").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_window_fails_closed() {
        let detection = DetectionConfig {
            daily_window_secs: 10_000_000_000_000,
            ..DetectionConfig::default()
        };
        let scorer = RiskScorer::rule_based(&detection);
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let evaluation = scorer.evaluate_detailed(&tx, now()).await;

        assert!(evaluation.fail_closed);
        assert_eq!(evaluation.decision, Decision::fail_closed());
        assert!(scorer.velocity().events("test-user").unwrap().is_empty());

        let detection = DetectionConfig {
            daily_window_secs: i64::MAX,
            ..DetectionConfig::default()
        };
        let scorer = RiskScorer::rule_based(&detection);
        assert!(scorer.evaluate_detailed(&tx, now()).await.fail_closed);
    }

    #[tokio::test]
    async fn test_malformed_request_fails_closed() {
        let scorer = RiskScorer::rule_based(&DetectionConfig::default());
        let request = CheckRequest {
            amount: Money::new(100, 2_000_000_000, "USD"),
            credit_card: CreditCardInfo {
                credit_card_number: Some(VALID_CARD.to_string()),
                credit_card_expiration_month: 12,
                credit_card_expiration_year: 2030,
                credit_card_cvv: Some(123),
            },
            user_id: Some("test-user".to_string()),
        };

        let evaluation = scorer.evaluate_request(request, now()).await;

        assert!(evaluation.fail_closed);
        assert_eq!(evaluation.decision.reason, "system error - transaction blocked for safety");
        assert!(scorer.velocity().events("test-user").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_well_formed_request() {
        let scorer = RiskScorer::rule_based(&DetectionConfig::default());
        let request = CheckRequest {
            amount: Money::new(42, 500_000_000, "USD"),
            credit_card: CreditCardInfo {
                credit_card_number: Some(VALID_CARD.to_string()),
                credit_card_expiration_month: 12,
                credit_card_expiration_year: 2030,
                credit_card_cvv: None,
            },
            user_id: None,
        };

        let evaluation = scorer.evaluate_request(request, now()).await;

        assert!(!evaluation.fail_closed);
        assert!(!evaluation.decision.is_fraud);
        assert_eq!(scorer.velocity().events("anonymous").unwrap()[0].amount, 42.5);
    }

    #[tokio::test]
    async fn test_check_then_record_race_is_preserved() {
        let scorer = scorer_with(Arc::new(GateAssessor {
            barrier: Barrier::new(2),
        }));
        for i in 0..4 {
            scorer
                .velocity()
                .record("racer", 10.0, now() - chrono::Duration::seconds(i + 1))
                .unwrap();
        }

        let tx = transaction(10.0, VALID_CARD, "racer");
        let (first, second) = tokio::join!(scorer.evaluate(&tx, now()), scorer.evaluate(&tx, now()));

        // Both saw four events before either recorded
        assert!(!first.is_fraud);
        assert!(!second.is_fraud);
        assert_eq!(scorer.velocity().events("racer").unwrap().len(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_evaluations_across_users() {
        let scorer = Arc::new(scorer_with(StaticAssessor::new(0.1, "Low risk")));

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let scorer = scorer.clone();
                tokio::spawn(async move {
                    let tx = transaction(25.0, VALID_CARD, &format!("user-{}", i % 8));
                    let at = now() + chrono::Duration::milliseconds(i);
                    scorer.evaluate(&tx, at).await
                })
            })
            .collect();

        for handle in handles {
            assert!(!handle.await.unwrap().is_fraud);
        }

        for user in 0..8 {
            let events = scorer.velocity().events(&format!("user-{user}")).unwrap();
            assert_eq!(events.len(), 4);
            assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }

    #[tokio::test]
    async fn test_cancelled_evaluation_records_nothing() {
        let scorer = scorer_with(Arc::new(SlowAssessor));
        let scorer = RiskScorer {
            assessor_timeout: Duration::from_secs(60),
            ..scorer
        };
        let tx = transaction(100.0, VALID_CARD, "test-user");

        let result =
            tokio::time::timeout(Duration::from_millis(20), scorer.evaluate(&tx, now())).await;

        assert!(result.is_err());
        assert!(scorer.velocity().events("test-user").unwrap().is_empty());
    }
}
