//! HTTP routes for the moderation and digest service.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use civic_common::logging::generate_trace_id;
use civic_common::request_span;

use crate::digest::DigestAggregator;
use crate::error::PipelineError;
use crate::moderation::{ModerationGate, ReviewPolicy, SubmissionDecision};
use crate::types::{DigestEntry, ModerationVerdict, Report};

/// Shared state behind every route.
#[derive(Clone)]
pub struct PipelineState {
    pub gate: Arc<ModerationGate>,
    pub policy: ReviewPolicy,
    pub aggregator: Arc<DigestAggregator>,
    /// Fired on shutdown; in-flight digests observe it
    pub shutdown: CancellationToken,
}

impl PipelineState {
    pub fn new(gate: ModerationGate, aggregator: DigestAggregator) -> Self {
        Self {
            gate: Arc::new(gate),
            policy: ReviewPolicy,
            aggregator: Arc::new(aggregator),
            shutdown: CancellationToken::new(),
        }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ModerateResponse {
    pub verdict: ModerationVerdict,
    pub decision: SubmissionDecision,
}

#[derive(Debug, Deserialize)]
pub struct DigestRequest {
    #[serde(default)]
    pub reports: Vec<Report>,
}

#[derive(Debug, Serialize)]
pub struct DigestResponse {
    /// Rendered digest text
    pub digest: String,
    pub entries: Vec<DigestEntry>,
    pub report_count: usize,
    pub generated_at: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let code = match &self {
            PipelineError::InvalidInput(_) => "INVALID_INPUT",
            PipelineError::Cancelled => "CANCELLED",
        };
        let error: civic_common::Error = self.into();
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({
            "success": false,
            "error": ErrorBody {
                code,
                message: error.to_string(),
            }
        });

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "civic-pipeline".to_string(),
    })
}

/// Malformed or mistyped JSON bodies answer with the standard error envelope.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, PipelineError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| PipelineError::InvalidInput(rejection.body_text()))
}

/// Screen one report body
pub async fn moderate(
    State(state): State<PipelineState>,
    body: Result<Json<ModerateRequest>, JsonRejection>,
) -> Result<Json<ModerateResponse>, PipelineError> {
    let request = json_body(body)?;
    let verdict = state.gate.moderate(&request.text).await;
    let decision = state.policy.decide(&verdict);

    Ok(Json(ModerateResponse { verdict, decision }))
}

/// Build a category digest for a batch of reports
pub async fn digest(
    State(state): State<PipelineState>,
    body: Result<Json<DigestRequest>, JsonRejection>,
) -> Result<Json<DigestResponse>, PipelineError> {
    let request = json_body(body)?;
    let trace_id = generate_trace_id();
    let span = request_span!("digest", trace_id, reports = request.reports.len());

    let digest = state
        .aggregator
        .build_digest_with_cancel(&request.reports, state.shutdown.child_token())
        .instrument(span)
        .await?;

    Ok(Json(DigestResponse {
        digest: digest.render(),
        report_count: digest.report_count(),
        entries: digest.entries,
        generated_at: chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn health_reports_service_name() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "civic-pipeline");
    }

    #[tokio::test]
    async fn pipeline_errors_map_to_http_status() {
        let response = PipelineError::InvalidInput("min_length must be greater than 0".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = PipelineError::Cancelled.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "CANCELLED");
        assert_eq!(json["success"], false);
    }
}
