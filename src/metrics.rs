//! Performance metrics and decision statistics for the fraud risk engine.

use crate::scorer::{AssessorOutcome, Evaluation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for evaluated transactions
pub struct EngineMetrics {
    /// Total transactions evaluated
    pub transactions_evaluated: AtomicU64,
    /// Transactions blocked
    pub transactions_blocked: AtomicU64,
    /// Blocked because evaluation failed internally
    pub fail_closed: AtomicU64,
    /// Assessor outcomes by kind
    assessor_outcomes: RwLock<HashMap<&'static str, u64>>,
    /// Evaluation times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_evaluated: AtomicU64::new(0),
            transactions_blocked: AtomicU64::new(0),
            fail_closed: AtomicU64::new(0),
            assessor_outcomes: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a finished evaluation
    pub fn record_evaluation(&self, processing_time: Duration, evaluation: &Evaluation) {
        self.transactions_evaluated.fetch_add(1, Ordering::Relaxed);

        if evaluation.decision.is_fraud {
            self.transactions_blocked.fetch_add(1, Ordering::Relaxed);
        }
        if evaluation.fail_closed {
            self.fail_closed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(outcome) = evaluation.assessor {
            self.record_assessor_outcome(outcome);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (evaluation.decision.risk_score * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    fn record_assessor_outcome(&self, outcome: AssessorOutcome) {
        if let Ok(mut outcomes) = self.assessor_outcomes.write() {
            *outcomes.entry(outcome.as_str()).or_insert(0) += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_evaluated.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn get_assessor_outcomes(&self) -> HashMap<&'static str, u64> {
        self.assessor_outcomes
            .read()
            .map(|o| o.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let evaluated = self.transactions_evaluated.load(Ordering::Relaxed);
        let blocked = self.transactions_blocked.load(Ordering::Relaxed);
        let fail_closed = self.fail_closed.load(Ordering::Relaxed);
        let block_rate = if evaluated > 0 {
            (blocked as f64 / evaluated as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();

        info!(
            evaluated,
            blocked,
            fail_closed,
            block_rate = format!("{:.1}%", block_rate),
            throughput = format!("{:.1} tx/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Fraud engine metrics summary"
        );

        for (outcome, count) in self.get_assessor_outcomes() {
            info!(outcome, count, "Assessor outcomes");
        }

        let distribution = self.get_score_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = (count as f64 / total as f64) * 100.0;
            info!(
                bucket = format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0),
                count,
                pct = format!("{:.1}%", pct),
                "Risk score distribution"
            );
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
