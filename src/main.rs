//! Fraud Risk Engine - Main Entry Point
//!
//! Answers fraud check requests received over NATS request/reply and
//! publishes an alert for every blocked transaction.

use anyhow::{Context, Result};
use chrono::Utc;
use fraud_risk_engine::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{EngineMetrics, MetricsReporter},
    producer::DecisionPublisher,
    scorer::{Evaluation, RiskScorer},
    types::{transaction::ANONYMOUS_USER, CheckRequest, FraudAlert},
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("fraud_risk_engine={}", logging.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Fraud Risk Engine");
    info!(
        max_amount = config.detection.max_amount_threshold,
        velocity_threshold = config.detection.velocity_threshold,
        daily_limit = config.detection.daily_limit,
        block_threshold = config.detection.block_threshold,
        "Detection configuration loaded"
    );

    let scorer = Arc::new(RiskScorer::from_config(&config)?);
    info!(assessor = scorer.has_assessor(), "Risk scorer initialized");

    let metrics = Arc::new(EngineMetrics::new());

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let publisher = Arc::new(DecisionPublisher::new(
        client.clone(),
        &config.nats.alert_subject,
    ));

    info!(
        workers = config.pipeline.workers,
        request_subject = %consumer.subject(),
        alert_subject = %publisher.alert_subject(),
        "Starting fraud check loop"
    );

    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers.max(1)));
    let config = Arc::new(config);

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let scorer = scorer.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let config = config.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let request_timeout = Duration::from_millis(config.pipeline.timeout_ms);

            let (evaluation, summary) =
                match serde_json::from_slice::<CheckRequest>(&message.payload) {
                    Ok(request) => {
                        let summary = (
                            request
                                .user_id
                                .clone()
                                .filter(|u| !u.is_empty())
                                .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
                            request.amount.to_amount().unwrap_or(0.0),
                            request.amount.currency_code.clone(),
                        );
                        let evaluation = match tokio::time::timeout(
                            request_timeout,
                            scorer.evaluate_request(request, Utc::now()),
                        )
                        .await
                        {
                            Ok(evaluation) => evaluation,
                            Err(_) => {
                                warn!(
                                    user_id = %summary.0,
                                    timeout_ms = config.pipeline.timeout_ms,
                                    "Evaluation timed out, blocking transaction"
                                );
                                Evaluation::fail_closed()
                            }
                        };
                        (evaluation, Some(summary))
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to deserialize fraud check request");
                        (Evaluation::fail_closed(), None)
                    }
                };

            let processing_time = start_time.elapsed();
            metrics.record_evaluation(processing_time, &evaluation);

            match message.reply {
                Some(reply_to) => {
                    if let Err(e) = publisher.reply(reply_to, &evaluation.decision).await {
                        error!(error = %e, "Failed to send fraud decision");
                    }
                }
                None => debug!("Fraud check request had no reply subject"),
            }

            if evaluation.decision.is_fraud {
                let (user_id, amount, currency) =
                    summary.unwrap_or_else(|| ("unknown".to_string(), 0.0, String::new()));
                let alert = FraudAlert::from_decision(
                    &user_id,
                    amount,
                    &currency,
                    &evaluation.decision,
                    &config.detection.risk_levels,
                );

                if let Err(e) = publisher.publish_alert(&alert).await {
                    error!(alert_id = %alert.alert_id, error = %e, "Failed to publish fraud alert");
                } else {
                    info!(
                        alert_id = %alert.alert_id,
                        user_id = %alert.user_id,
                        risk_score = alert.risk_score,
                        risk_level = alert.risk_level.as_str(),
                        processing_time_us = processing_time.as_micros() as u64,
                        "Fraud alert published"
                    );
                }
            }

            drop(permit);
        });
    }

    info!("Fraud Risk Engine shutting down...");
    metrics.print_summary();

    Ok(())
}
