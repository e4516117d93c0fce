//! Configuration management for the fraud risk engine

use crate::types::alert::RiskLevelThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Longest tracking window accepted from configuration
pub const MAX_WINDOW_SECS: i64 = 366 * 24 * 3600;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub detection: DetectionConfig,
    pub assessor: AssessorConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming fraud check requests
    pub request_subject: String,
    /// Subject for outgoing fraud alerts
    pub alert_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_subject: "fraud.check".to_string(),
            alert_subject: "fraud.alerts".to_string(),
        }
    }
}

/// Rule thresholds and scoring policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Amounts strictly above this are flagged
    pub max_amount_threshold: f64,
    /// Exact amounts that are flagged as decoys
    pub suspicious_amounts: Vec<f64>,
    /// Transactions per velocity window that trigger a flag
    pub velocity_threshold: usize,
    /// Maximum spend per daily window
    pub daily_limit: f64,
    pub velocity_window_secs: i64,
    pub daily_window_secs: i64,
    /// Aggregate score above which a transaction is blocked
    pub block_threshold: f64,
    pub weights: ScoreWeights,
    /// Risk level classification for published alerts
    pub risk_levels: RiskLevelThresholds,
}

impl DetectionConfig {
    /// Reject values that would disable a rule or make evaluation fail
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_amount_threshold.is_finite() && self.max_amount_threshold > 0.0,
            "detection.max_amount_threshold must be positive, got {}",
            self.max_amount_threshold
        );
        ensure!(
            self.suspicious_amounts.iter().all(|a| a.is_finite()),
            "detection.suspicious_amounts must be finite"
        );
        ensure!(
            self.velocity_threshold > 0,
            "detection.velocity_threshold must be at least 1"
        );
        ensure!(
            self.daily_limit.is_finite() && self.daily_limit > 0.0,
            "detection.daily_limit must be positive, got {}",
            self.daily_limit
        );
        for (name, secs) in [
            ("velocity_window_secs", self.velocity_window_secs),
            ("daily_window_secs", self.daily_window_secs),
        ] {
            ensure!(
                (1..=MAX_WINDOW_SECS).contains(&secs),
                "detection.{} must be between 1 and {}, got {}",
                name,
                MAX_WINDOW_SECS,
                secs
            );
        }
        ensure!(
            (0.0..=1.0).contains(&self.block_threshold),
            "detection.block_threshold must be within [0, 1], got {}",
            self.block_threshold
        );
        self.weights.validate()?;

        let levels = &self.risk_levels;
        ensure!(
            0.0 <= levels.medium && levels.medium <= levels.high && levels.high <= levels.critical,
            "detection.risk_levels must satisfy 0 <= medium <= high <= critical"
        );

        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_amount_threshold: 10_000.0,
            suspicious_amounts: vec![9999.99, 5000.00, 1000.00],
            velocity_threshold: 5,
            daily_limit: 50_000.0,
            velocity_window_secs: 60,
            daily_window_secs: 24 * 3600,
            block_threshold: 0.7,
            weights: ScoreWeights::default(),
            risk_levels: RiskLevelThresholds::default(),
        }
    }
}

/// Score contribution of each finding
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub card: f64,
    pub amount: f64,
    pub velocity: f64,
    /// Multiplier applied to the assessor's [0, 1] score
    pub assessor: f64,
}

impl ScoreWeights {
    fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("card", self.card),
            ("amount", self.amount),
            ("velocity", self.velocity),
            ("assessor", self.assessor),
        ] {
            ensure!(
                weight.is_finite() && weight >= 0.0,
                "detection.weights.{} must be a non-negative number, got {}",
                name,
                weight
            );
        }
        Ok(())
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            card: 0.8,
            amount: 0.6,
            velocity: 0.7,
            assessor: 0.3,
        }
    }
}

/// External risk assessor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssessorConfig {
    /// Use the assessor when an API key is present
    pub enabled: bool,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub endpoint: String,
    pub model: String,
    /// Upper bound for a single assessment call
    pub timeout_ms: u64,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: "GEMINI_API_KEY".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-pro".to_string(),
            timeout_ms: 2000,
        }
    }
}

impl AssessorConfig {
    /// API key from the environment, if the assessor is enabled and the key is set
    pub fn api_key(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum concurrent evaluations
    pub workers: usize,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Interval between metrics summaries
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout_ms: 5000,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path. The file is optional;
    /// `FRAUD__SECTION__KEY` environment variables override it.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("FRAUD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config
            .detection
            .validate()
            .context("Invalid detection configuration")?;

        Ok(config)
    }
}
