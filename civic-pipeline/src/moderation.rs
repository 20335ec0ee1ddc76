//! Moderation gate: remote classification with keyword fallback.
//!
//! ```text
//! text ──► classifier (timeout, optional retries) ──ok──► verdict { source: REMOTE }
//!                    │
//!                    └── any failure ──► keyword filter ──► verdict { source: FALLBACK }
//! ```
//!
//! `moderate` always returns a verdict.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use civic_common::config::ModerationConfig;

use crate::classifier::Classifier;
use crate::error::ClientFailure;
use crate::keywords::KeywordFilter;
use crate::types::{ModerationVerdict, RemoteClassification, ReportText};

/// Retry behaviour for classification attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubles with each retry).
    pub base_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `attempt` (0-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Composes a remote classifier and a keyword filter into one verdict.
pub struct ModerationGate {
    classifier: Arc<dyn Classifier>,
    fallback: KeywordFilter,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ModerationGate {
    pub fn new(classifier: Arc<dyn Classifier>, fallback: KeywordFilter, timeout: Duration) -> Self {
        Self {
            classifier,
            fallback,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_config(classifier: Arc<dyn Classifier>, config: &ModerationConfig) -> Self {
        Self::new(
            classifier,
            KeywordFilter::new(&config.deny_list),
            config.timeout(),
        )
        .with_retry(RetryPolicy {
            max_retries: config.max_retries,
            base_backoff_ms: config.retry_backoff_ms,
            ..RetryPolicy::default()
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Moderate one submission body.
    pub async fn moderate(&self, text: &str) -> ModerationVerdict {
        let start = Instant::now();

        let text = match ReportText::new(text) {
            Ok(text) => text,
            Err(_) => {
                tracing::debug!("Empty report text, skipping classifier");
                return self.fallback.check("");
            }
        };

        match self.classify_with_retry(&text).await {
            Ok(classification) => {
                let verdict = ModerationVerdict::from(classification);
                tracing::info!(
                    source = "remote",
                    flagged = verdict.flagged,
                    label = %verdict.label,
                    confidence = verdict.confidence,
                    text_chars = text.char_len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Moderation verdict"
                );
                verdict
            }
            Err(failure) => {
                let verdict = self.fallback.check(text.as_str());
                tracing::warn!(
                    source = "fallback",
                    failure = failure.kind(),
                    error = %failure,
                    flagged = verdict.flagged,
                    text_chars = text.char_len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Classifier unusable, applied keyword fallback"
                );
                verdict
            }
        }
    }

    async fn classify_with_retry(
        &self,
        text: &ReportText,
    ) -> Result<RemoteClassification, ClientFailure> {
        let mut attempt = 0;
        loop {
            match self.classify_once(text).await {
                Ok(classification) => {
                    if attempt > 0 {
                        tracing::info!(
                            classifier = self.classifier.name(),
                            attempt = attempt + 1,
                            "Classifier recovered after retries"
                        );
                    }
                    return Ok(classification);
                }
                Err(failure) if attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff_delay(attempt);
                    tracing::warn!(
                        classifier = self.classifier.name(),
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        failure = failure.kind(),
                        "Classifier call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }

    /// One deadline-bounded attempt. The deadline holds even if the
    /// classifier ignores the timeout it is handed.
    async fn classify_once(
        &self,
        text: &ReportText,
    ) -> Result<RemoteClassification, ClientFailure> {
        match tokio::time::timeout(self.timeout, self.classifier.classify(text, self.timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(ClientFailure::Timeout(self.timeout)),
        }
    }
}

// ============================================================================
// Submission policy
// ============================================================================

/// What the submission workflow should do with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionDecision {
    Accept,
    Reject,
    HoldForReview,
}

/// Maps verdicts to submission decisions.
///
/// Keyword matches are coarse, so a fallback flag only holds the report for
/// a human instead of rejecting it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewPolicy;

impl ReviewPolicy {
    pub fn decide(&self, verdict: &ModerationVerdict) -> SubmissionDecision {
        match (verdict.flagged, verdict.is_fallback()) {
            (false, _) => SubmissionDecision::Accept,
            (true, false) => SubmissionDecision::Reject,
            (true, true) => SubmissionDecision::HoldForReview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerdictSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Respond(&'static str, f32),
        Fail,
        Hang,
        FailThenRespond(usize, &'static str, f32),
    }

    struct MockClassifier {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl MockClassifier {
        fn new(behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    behavior,
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Classifier for MockClassifier {
        fn name(&self) -> &str {
            "mock"
        }

        async fn classify(
            &self,
            _text: &ReportText,
            _timeout: Duration,
        ) -> Result<RemoteClassification, ClientFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let respond = |label: &str, score: f32| RemoteClassification {
                label: label.to_string(),
                confidence: score,
                flagged: label == "hate",
            };
            match self.behavior {
                Behavior::Respond(label, score) => Ok(respond(label, score)),
                Behavior::Fail => Err(ClientFailure::Status {
                    status: 500,
                    body: "boom".into(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hung classifier was not cancelled")
                }
                Behavior::FailThenRespond(failures, label, score) => {
                    if call <= failures {
                        Err(ClientFailure::Unavailable("connection reset".into()))
                    } else {
                        Ok(respond(label, score))
                    }
                }
            }
        }
    }

    fn gate(classifier: Arc<dyn Classifier>) -> ModerationGate {
        ModerationGate::new(
            classifier,
            KeywordFilter::new(["gali", "abuse", "spam"]),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn remote_hate_label_flags() {
        let (classifier, calls) = MockClassifier::new(Behavior::Respond("hate", 0.92));
        let verdict = gate(classifier).moderate("...").await;
        assert_eq!(
            verdict,
            ModerationVerdict {
                flagged: true,
                label: "hate".into(),
                confidence: 0.92,
                source: VerdictSource::Remote,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_failure_routes_to_fallback() {
        let (classifier, _) = MockClassifier::new(Behavior::Fail);
        let gate = gate(classifier);

        let flagged = gate.moderate("pure spam").await;
        assert!(flagged.flagged);
        assert_eq!(flagged.source, VerdictSource::Fallback);

        let clean = gate.moderate("fallen tree on Elm Rd").await;
        assert!(!clean.flagged);
        assert_eq!(clean.source, VerdictSource::Fallback);
        assert_eq!(clean.label, "neutral");
        assert_eq!(clean.confidence, 0.5);
    }

    #[tokio::test]
    async fn blank_text_skips_classifier() {
        let (classifier, calls) = MockClassifier::new(Behavior::Respond("hate", 0.99));
        let verdict = gate(classifier).moderate("   ").await;
        assert!(!verdict.flagged);
        assert_eq!(verdict.source, VerdictSource::Fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hung_classifier_is_bounded_by_timeout() {
        let (classifier, _) = MockClassifier::new(Behavior::Hang);
        let start = Instant::now();
        let verdict = gate(classifier).moderate("water main burst").await;
        let elapsed = start.elapsed();

        assert_eq!(verdict.source, VerdictSource::Fallback);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn retries_then_uses_remote() {
        let (classifier, calls) = MockClassifier::new(Behavior::FailThenRespond(1, "nothate", 0.8));
        let gate = gate(classifier).with_retry(RetryPolicy {
            max_retries: 2,
            base_backoff_ms: 1,
            max_backoff_ms: 10,
        });

        let verdict = gate.moderate("broken bench").await;
        assert_eq!(verdict.source, VerdictSource::Remote);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn falls_back_after_retries_exhausted() {
        let (classifier, calls) = MockClassifier::new(Behavior::Fail);
        let gate = gate(classifier).with_retry(RetryPolicy {
            max_retries: 2,
            base_backoff_ms: 1,
            max_backoff_ms: 10,
        });

        let verdict = gate.moderate("broken bench").await;
        assert_eq!(verdict.source, VerdictSource::Fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(policy.backoff_delay(0).as_millis(), 100);
        assert_eq!(policy.backoff_delay(1).as_millis(), 200);
        assert_eq!(policy.backoff_delay(2).as_millis(), 400);
        assert_eq!(policy.backoff_delay(20).as_millis(), 500);
    }

    #[test]
    fn from_config_carries_policy() {
        let (classifier, _) = MockClassifier::new(Behavior::Fail);
        let config = ModerationConfig {
            timeout_ms: 750,
            max_retries: 1,
            deny_list: vec!["Troll".into()],
            ..ModerationConfig::default()
        };
        let gate = ModerationGate::from_config(classifier, &config);
        assert_eq!(gate.timeout(), Duration::from_millis(750));
        assert_eq!(gate.retry.max_retries, 1);
        assert_eq!(gate.fallback.tokens(), &["troll".to_string()]);
    }

    #[test]
    fn review_policy_decisions() {
        let policy = ReviewPolicy;
        assert_eq!(
            policy.decide(&ModerationVerdict::remote(false, "nothate", 0.9)),
            SubmissionDecision::Accept
        );
        assert_eq!(
            policy.decide(&ModerationVerdict::remote(true, "hate", 0.9)),
            SubmissionDecision::Reject
        );
        assert_eq!(
            policy.decide(&ModerationVerdict::fallback(true)),
            SubmissionDecision::HoldForReview
        );
        assert_eq!(
            policy.decide(&ModerationVerdict::fallback(false)),
            SubmissionDecision::Accept
        );
    }
}
