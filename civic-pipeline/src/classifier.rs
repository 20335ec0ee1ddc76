//! Remote text classification client.
//!
//! The classification service answers with a list of `{label, score}` pairs,
//! sometimes wrapped in an outer list (one inner list per input). The body is
//! decoded into that exact schema; anything else is a `ClientFailure`, never
//! a "not flagged" verdict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use civic_common::Config;

use crate::error::ClientFailure;
use crate::inference::{build_client, post_json};
use crate::types::{RemoteClassification, ReportText};

/// A text classifier that may be slow or unavailable.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Classify one report. Makes at most one remote call and never retries.
    async fn classify(
        &self,
        text: &ReportText,
        timeout: Duration,
    ) -> Result<RemoteClassification, ClientFailure>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Flat(Vec<LabelScore>),
    Nested(Vec<Vec<LabelScore>>),
}

impl ClassifyResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            Self::Flat(scores) => scores,
            Self::Nested(batches) => batches.into_iter().flatten().collect(),
        }
    }
}

/// Decode a classifier body and pick the highest-confidence label.
///
/// `violation_labels` are compared case-insensitively against the winner.
pub fn decode_classification(
    body: &[u8],
    violation_labels: &[String],
) -> Result<RemoteClassification, ClientFailure> {
    let response: ClassifyResponse = serde_json::from_slice(body)
        .map_err(|e| ClientFailure::Malformed(format!("unexpected classifier payload: {e}")))?;

    let best = response
        .into_scores()
        .into_iter()
        .filter(|s| s.score.is_finite())
        .reduce(|best, next| if next.score > best.score { next } else { best })
        .ok_or_else(|| ClientFailure::Malformed("classifier returned no scored labels".into()))?;

    let label = best.label.trim();
    if label.is_empty() {
        return Err(ClientFailure::Malformed("classifier returned an empty label".into()));
    }

    let flagged = violation_labels
        .iter()
        .any(|v| v.trim().eq_ignore_ascii_case(label));

    Ok(RemoteClassification {
        label: label.to_string(),
        confidence: best.score.clamp(0.0, 1.0),
        flagged,
    })
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Classifier backed by a hosted inference endpoint.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    violation_labels: Vec<String>,
}

impl HttpClassifier {
    /// Create a classifier for `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<&str>,
        violation_labels: Vec<String>,
    ) -> Self {
        Self {
            client: build_client(token),
            endpoint: endpoint.into(),
            violation_labels,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.moderation.endpoint.clone(),
            config.secrets.inference_token.as_deref(),
            config.moderation.violation_labels.clone(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        "http-classifier"
    }

    async fn classify(
        &self,
        text: &ReportText,
        timeout: Duration,
    ) -> Result<RemoteClassification, ClientFailure> {
        let start = Instant::now();
        let request = ClassifyRequest {
            inputs: text.as_str(),
        };

        let body = post_json(&self.client, &self.endpoint, &request, timeout).await?;
        let classification = decode_classification(&body, &self.violation_labels)?;

        tracing::debug!(
            label = %classification.label,
            confidence = classification.confidence,
            flagged = classification.flagged,
            latency_ms = start.elapsed().as_millis() as u64,
            "Classifier responded"
        );

        Ok(classification)
    }
}
