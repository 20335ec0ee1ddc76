//! Abstractive summarization client with truncation fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use civic_common::util::truncate_with_ellipsis;
use civic_common::Config;

use crate::error::{ClientFailure, PipelineError};
use crate::inference::{build_client, post_json};

/// Summary ceiling when the caller has no preference.
pub const DEFAULT_MAX_LENGTH: usize = 100;

/// Summary floor when the caller has no preference.
pub const DEFAULT_MIN_LENGTH: usize = 30;

/// A remote summarizer that may be slow or unavailable.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Summarize `text` within the given length bounds. One remote call, no retries.
    async fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
        timeout: Duration,
    ) -> Result<String, ClientFailure>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    inputs: &'a str,
    parameters: SummarizeParameters,
}

#[derive(Debug, Serialize)]
struct SummarizeParameters {
    max_length: usize,
    min_length: usize,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    summary_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummarizeResponse {
    Single(SummaryBody),
    List(Vec<SummaryBody>),
}

/// Decode a summarizer body into its summary text.
pub fn decode_summary(body: &[u8]) -> Result<String, ClientFailure> {
    let response: SummarizeResponse = serde_json::from_slice(body)
        .map_err(|e| ClientFailure::Malformed(format!("unexpected summarizer payload: {e}")))?;

    let summary = match response {
        SummarizeResponse::Single(body) => Some(body),
        SummarizeResponse::List(bodies) => bodies.into_iter().next(),
    }
    .map(|b| b.summary_text)
    .ok_or_else(|| ClientFailure::Malformed("summarizer returned an empty list".into()))?;

    if summary.trim().is_empty() {
        return Err(ClientFailure::Malformed("summarizer returned empty summary_text".into()));
    }

    Ok(summary)
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Summarizer backed by a hosted inference endpoint.
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSummarizer {
    pub fn new(endpoint: impl Into<String>, token: Option<&str>) -> Self {
        Self {
            client: build_client(token),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.summarizer.endpoint.clone(),
            config.secrets.inference_token.as_deref(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    fn name(&self) -> &str {
        "http-summarizer"
    }

    async fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
        timeout: Duration,
    ) -> Result<String, ClientFailure> {
        let request = SummarizeRequest {
            inputs: text,
            parameters: SummarizeParameters {
                max_length,
                min_length,
            },
        };

        let body = post_json(&self.client, &self.endpoint, &request, timeout).await?;
        decode_summary(&body)
    }
}

// ============================================================================
// Fallback wrapper
// ============================================================================

/// Result of a summarization with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    /// True when `text` is the local truncation rather than a remote summary
    pub degraded: bool,
}

/// Summarizer front end that never fails on remote faults.
///
/// Invalid length bounds or blank text are rejected; every remote failure
/// (including the deadline) yields the first `max_length` characters of the
/// input followed by "...".
#[derive(Clone)]
pub struct SummarizerClient {
    inner: Arc<dyn Summarizer>,
    timeout: Duration,
}

impl SummarizerClient {
    pub fn new(inner: Arc<dyn Summarizer>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Summarize `text`, falling back to truncation on any remote failure.
    pub async fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, PipelineError> {
        self.summarize_detailed(text, max_length, min_length)
            .await
            .map(|s| s.text)
    }

    /// Like [`summarize`](Self::summarize) but reports whether the fallback was used.
    pub async fn summarize_detailed(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<Summary, PipelineError> {
        validate_bounds(text, max_length, min_length)?;

        let start = Instant::now();
        let attempt = tokio::time::timeout(
            self.timeout,
            self.inner.summarize(text, max_length, min_length, self.timeout),
        )
        .await
        .unwrap_or(Err(ClientFailure::Timeout(self.timeout)));

        match attempt {
            Ok(summary) => {
                tracing::debug!(
                    summarizer = self.inner.name(),
                    input_chars = text.chars().count(),
                    summary_chars = summary.chars().count(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Summary produced"
                );
                Ok(Summary {
                    text: summary,
                    degraded: false,
                })
            }
            Err(failure) => {
                tracing::warn!(
                    summarizer = self.inner.name(),
                    failure = failure.kind(),
                    error = %failure,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Summarizer unusable, truncating input"
                );
                Ok(Summary {
                    text: truncate_with_ellipsis(text, max_length),
                    degraded: true,
                })
            }
        }
    }
}

fn validate_bounds(text: &str, max_length: usize, min_length: usize) -> Result<(), PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "text to summarize must not be empty".into(),
        ));
    }
    if min_length == 0 {
        return Err(PipelineError::InvalidInput(
            "min_length must be greater than 0".into(),
        ));
    }
    if min_length > max_length {
        return Err(PipelineError::InvalidInput(format!(
            "min_length ({min_length}) must not exceed max_length ({max_length})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSummarizer {
        reply: Result<&'static str, ()>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedSummarizer {
        fn ok(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok("too late"),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn summarize(
            &self,
            _text: &str,
            _max_length: usize,
            _min_length: usize,
            _timeout: Duration,
        ) -> Result<String, ClientFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(str::to_string)
                .map_err(|_| ClientFailure::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn returns_remote_summary_verbatim() {
        let client = SummarizerClient::new(
            FixedSummarizer::ok("Residents report potholes."),
            Duration::from_secs(1),
        );
        let summary = client
            .summarize_detailed("• Pothole: Large pothole on Main St", 150, 30)
            .await
            .unwrap();
        assert_eq!(summary.text, "Residents report potholes.");
        assert!(!summary.degraded);
    }

    #[tokio::test]
    async fn failure_truncates_with_marker() {
        let client = SummarizerClient::new(FixedSummarizer::failing(), Duration::from_secs(1));
        let text = "a".repeat(200);
        let summary = client.summarize(&text, 150, 30).await.unwrap();
        assert_eq!(summary, format!("{}...", "a".repeat(150)));
    }

    #[tokio::test]
    async fn short_input_still_gets_marker() {
        let client = SummarizerClient::new(FixedSummarizer::failing(), Duration::from_secs(1));
        let summary = client
            .summarize("• Pothole: Large pothole on Main St", 150, 30)
            .await
            .unwrap();
        assert_eq!(summary, "• Pothole: Large pothole on Main St...");
    }

    #[tokio::test]
    async fn slow_summarizer_hits_deadline() {
        let client = SummarizerClient::new(
            FixedSummarizer::slow(Duration::from_secs(30)),
            Duration::from_millis(50),
        );
        let start = Instant::now();
        let summary = client.summarize_detailed("leak", 100, 30).await.unwrap();
        assert!(summary.degraded);
        assert_eq!(summary.text, "leak...");
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn invalid_bounds_are_rejected_without_calling() {
        let inner = FixedSummarizer::ok("unused");
        let client = SummarizerClient::new(inner.clone(), Duration::from_secs(1));

        for (text, max, min) in [("x", 100, 0), ("x", 10, 30), ("   ", 100, 30)] {
            let err = client.summarize(text, max, min).await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)));
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn decodes_object_and_list_forms() {
        assert_eq!(
            decode_summary(br#"{"summary_text":"Short."}"#).unwrap(),
            "Short."
        );
        assert_eq!(
            decode_summary(br#"[{"summary_text":"Listed."}]"#).unwrap(),
            "Listed."
        );
    }

    #[test]
    fn rejects_malformed_summaries() {
        let cases: &[&[u8]] = &[
            b"[]",
            br#"{"summary_text":""}"#,
            br#"{"generated_text":"wrong field"}"#,
            br#"{"error":"Model is loading","estimated_time":20.0}"#,
            b"<html>502</html>",
        ];
        for body in cases {
            assert!(matches!(
                decode_summary(body),
                Err(ClientFailure::Malformed(_))
            ));
        }
    }

    #[tokio::test]
    async fn http_summarizer_sends_length_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "inputs": "• Leak: Pipe burst",
                "parameters": {"max_length": 150, "min_length": 30}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"summary_text": "A pipe burst."}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let summarizer = HttpSummarizer::new(server.uri(), Some("hf_x"));
        let summary = summarizer
            .summarize("• Leak: Pipe burst", 150, 30, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(summary, "A pipe burst.");
    }

    #[tokio::test]
    async fn http_error_payload_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Model is loading"})),
            )
            .mount(&server)
            .await;

        let client = SummarizerClient::new(
            Arc::new(HttpSummarizer::new(server.uri(), None)),
            Duration::from_secs(2),
        );
        let summary = client.summarize_detailed("Broken swing", 5, 1).await.unwrap();
        assert!(summary.degraded);
        assert_eq!(summary.text, "Broke...");
    }
}
