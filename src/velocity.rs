//! Per-user velocity and daily spend tracking.
//!
//! Histories live in a sharded map of independently locked entries. Entries
//! are created lazily under the owning shard's lock; afterwards every read and
//! write for a user goes through that user's own mutex, so different users
//! never contend with each other.

use crate::error::{EvaluationError, EvaluationResult};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// A single accepted transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
}

/// Accepted transactions for one user, ordered by timestamp
#[derive(Debug, Default)]
pub struct UserHistory {
    events: Vec<TransactionEvent>,
}

impl UserHistory {
    /// Drop events at or before `cutoff`.
    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let stale = self.events.partition_point(|e| e.timestamp <= cutoff);
        self.events.drain(..stale);
        stale
    }

    /// Insert keeping timestamp order; equal timestamps keep arrival order.
    fn insert(&mut self, event: TransactionEvent) {
        let pos = self
            .events
            .partition_point(|e| e.timestamp <= event.timestamp);
        self.events.insert(pos, event);
    }

    fn count_after(&self, cutoff: DateTime<Utc>) -> usize {
        self.events.iter().filter(|e| e.timestamp > cutoff).count()
    }

    fn spend_after(&self, cutoff: DateTime<Utc>) -> f64 {
        self.events
            .iter()
            .filter(|e| e.timestamp > cutoff)
            .map(|e| e.amount)
            .sum()
    }
}

/// Outcome of a velocity check
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityCheck {
    pub suspicious: bool,
    pub reason: String,
    /// Events inside the velocity window at check time
    pub recent_count: usize,
}

/// Tracks per-user transaction velocity and rolling spend
pub struct VelocityTracker {
    users: DashMap<String, Arc<Mutex<UserHistory>>>,
    velocity_threshold: usize,
    daily_limit: f64,
    velocity_window: Duration,
    daily_window: Duration,
}

impl VelocityTracker {
    pub fn new(
        velocity_threshold: usize,
        daily_limit: f64,
        velocity_window: Duration,
        daily_window: Duration,
    ) -> Self {
        Self {
            users: DashMap::new(),
            velocity_threshold,
            daily_limit,
            velocity_window,
            daily_window,
        }
    }

    /// Get or lazily create the history entry for a user
    fn entry(&self, user_id: &str) -> Arc<Mutex<UserHistory>> {
        self.users.entry(user_id.to_string()).or_default().clone()
    }

    /// Check velocity and daily spend for a proposed amount at `now`.
    ///
    /// Prunes events older than the daily window as a side effect. Events
    /// older than the velocity window are kept because they still count
    /// toward daily spend.
    pub fn check(
        &self,
        user_id: &str,
        proposed_amount: f64,
        now: DateTime<Utc>,
    ) -> EvaluationResult<VelocityCheck> {
        let entry = self.entry(user_id);
        let mut history = entry
            .lock()
            .map_err(|_| EvaluationError::StatePoisoned(user_id.to_string()))?;

        let pruned = history.prune(Self::cutoff(now, self.horizon())?);
        if pruned > 0 {
            trace!(user_id = %user_id, pruned, "Pruned stale transaction events");
        }

        let recent_count = history.count_after(Self::cutoff(now, self.velocity_window)?);
        if recent_count >= self.velocity_threshold {
            return Ok(VelocityCheck {
                suspicious: true,
                reason: format!("Too many transactions: {} in last minute", recent_count),
                recent_count,
            });
        }

        let daily_spending =
            history.spend_after(Self::cutoff(now, self.daily_window)?) + proposed_amount;
        if daily_spending > self.daily_limit {
            return Ok(VelocityCheck {
                suspicious: true,
                reason: format!("Daily spending limit exceeded: ${:.2}", daily_spending),
                recent_count,
            });
        }

        Ok(VelocityCheck {
            suspicious: false,
            reason: "Velocity check passed".to_string(),
            recent_count,
        })
    }

    /// Record an accepted transaction. No pruning happens on write.
    pub fn record(&self, user_id: &str, amount: f64, now: DateTime<Utc>) -> EvaluationResult<()> {
        let entry = self.entry(user_id);
        let mut history = entry
            .lock()
            .map_err(|_| EvaluationError::StatePoisoned(user_id.to_string()))?;

        history.insert(TransactionEvent {
            timestamp: now,
            amount,
        });

        debug!(
            user_id = %user_id,
            amount,
            retained = history.events.len(),
            "Recorded transaction"
        );

        Ok(())
    }

    /// Snapshot of a user's retained events, oldest first
    pub fn events(&self, user_id: &str) -> EvaluationResult<Vec<TransactionEvent>> {
        let entry = match self.users.get(user_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };

        let history = entry
            .lock()
            .map_err(|_| EvaluationError::StatePoisoned(user_id.to_string()))?;
        Ok(history.events.clone())
    }

    /// Number of users with a history entry
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Start of a window ending at `now`
    fn cutoff(now: DateTime<Utc>, window: Duration) -> EvaluationResult<DateTime<Utc>> {
        now.checked_sub_signed(window)
            .ok_or(EvaluationError::WindowOutOfRange(window.num_seconds()))
    }

    /// Longest window any check reads from
    fn horizon(&self) -> Duration {
        self.velocity_window.max(self.daily_window)
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(5, 50_000.0, Duration::seconds(60), Duration::hours(24))
    }
}
