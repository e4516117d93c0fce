//! Generative-language risk assessor backed by the Gemini `generateContent` API

use crate::assessor::{Assessment, AssessmentContext, RiskAssessor};
use crate::config::AssessorConfig;
use crate::error::AssessorError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Fallback when the model replies without the expected format
const UNSTRUCTURED_SCORE: f64 = 0.2;
const UNSTRUCTURED_REASON: &str = "AI assessment completed";

/// Assessor that prompts a hosted generative model
pub struct GeminiAssessor {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiAssessor {
    /// Build an assessor from configuration and an API key
    pub fn new(config: &AssessorConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build assessor HTTP client")?;

        let url = format!(
            "{}/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );

        info!(model = %config.model, "Gemini risk assessor initialized");

        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    /// Build the assessor only if configuration and environment allow it
    pub fn from_config(config: &AssessorConfig) -> Result<Option<Self>> {
        match config.api_key() {
            Some(key) => Ok(Some(Self::new(config, key)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RiskAssessor for GeminiAssessor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn assess(&self, context: &AssessmentContext) -> Result<Assessment, AssessorError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(context),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssessorError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .find(|t| !t.trim().is_empty())
            .ok_or(AssessorError::EmptyResponse)?;

        debug!(response = %text.trim(), "Gemini assessment received");

        Ok(parse_response(&text))
    }
}

/// Prompt asking the model for a `SCORE:<f>|REASON:<text>` reply
pub fn build_prompt(context: &AssessmentContext) -> String {
    format!(
        "Analyze this payment transaction for fraud risk:\n\
         \n\
         Amount: ${:.2}\n\
         Currency: {}\n\
         Card Type: {}\n\
         Transaction Time: {}\n\
         User Pattern: {}\n\
         \n\
         Consider these fraud indicators:\n\
         - Unusual amounts or patterns\n\
         - Time-based anomalies\n\
         - Geographic inconsistencies\n\
         - Velocity patterns\n\
         \n\
         Return a fraud risk score from 0.0 (no risk) to 1.0 (high risk) and a brief explanation.\n\
         Format: SCORE:0.X|REASON:explanation",
        context.amount, context.currency, context.card_prefix, context.timestamp, context.user_pattern
    )
}

/// Parse a model reply. Anything not in `SCORE:<f>|REASON:<text>` form
/// yields the unstructured fallback. An empty reason is returned as is.
pub fn parse_response(text: &str) -> Assessment {
    let text = text.trim();

    if let Some((score_part, reason_part)) = text.split_once('|') {
        let score = score_part.replace("SCORE:", "");
        let reason = reason_part
            .split('|')
            .next()
            .unwrap_or_default()
            .replace("REASON:", "");

        if let Ok(score) = score.trim().parse::<f64>() {
            return Assessment::new(score, reason.trim());
        }
    }

    Assessment::new(UNSTRUCTURED_SCORE, UNSTRUCTURED_REASON)
}
