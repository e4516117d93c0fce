//! NATS publisher for decisions and fraud alerts

use crate::types::alert::FraudAlert;
use crate::types::decision::Decision;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Sends decisions back to requesters and alerts to the alert subject
#[derive(Clone)]
pub struct DecisionPublisher {
    client: Client,
    alert_subject: String,
}

impl DecisionPublisher {
    pub fn new(client: Client, alert_subject: &str) -> Self {
        Self {
            client,
            alert_subject: alert_subject.to_string(),
        }
    }

    /// Reply to a request with its decision
    pub async fn reply(&self, reply_to: Subject, decision: &Decision) -> Result<()> {
        let payload = serde_json::to_vec(decision)?;
        self.client.publish(reply_to, payload.into()).await?;
        Ok(())
    }

    /// Publish an alert for a blocked transaction
    pub async fn publish_alert(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.alert_subject.clone(), payload.into())
            .await?;

        debug!(
            alert_id = %alert.alert_id,
            user_id = %alert.user_id,
            risk_score = alert.risk_score,
            "Published fraud alert"
        );

        Ok(())
    }

    pub fn alert_subject(&self) -> &str {
        &self.alert_subject
    }
}
