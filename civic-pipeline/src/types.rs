//! Value types flowing through the moderation and digest pipeline.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Confidence reported for every verdict produced by the keyword fallback.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Label reported for every verdict produced by the keyword fallback.
pub const FALLBACK_LABEL: &str = "neutral";

// ============================================================================
// Report text
// ============================================================================

/// Citizen submission body that is known to contain non-whitespace text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportText(String);

impl ReportText {
    /// Validate and wrap a submission body.
    pub fn new(text: impl Into<String>) -> Result<Self, PipelineError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "report text must not be empty".into(),
            ));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, for logging without the content.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl TryFrom<&str> for ReportText {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for ReportText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Verdicts
// ============================================================================

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictSource {
    /// The remote classification service answered.
    Remote,
    /// The local keyword filter stood in for the classifier.
    Fallback,
}

/// Moderation outcome for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub label: String,
    pub confidence: f32,
    pub source: VerdictSource,
}

impl ModerationVerdict {
    /// Verdict backed by the remote classifier. Confidence is clamped to `[0, 1]`.
    pub fn remote(flagged: bool, label: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            flagged,
            label: label.into(),
            confidence,
            source: VerdictSource::Remote,
        }
    }

    /// Verdict produced by the keyword fallback.
    pub fn fallback(flagged: bool) -> Self {
        Self {
            flagged,
            label: FALLBACK_LABEL.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            source: VerdictSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == VerdictSource::Fallback
    }
}

/// Normalized answer from the classification service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteClassification {
    pub label: String,
    pub confidence: f32,
    pub flagged: bool,
}

impl From<RemoteClassification> for ModerationVerdict {
    fn from(c: RemoteClassification) -> Self {
        ModerationVerdict::remote(c.flagged, c.label, c.confidence)
    }
}

// ============================================================================
// Reports and digests
// ============================================================================

/// A report as supplied by the admin digest workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub description: String,
    pub category: String,
}

impl Report {
    pub fn new(
        category: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
        }
    }
}

/// Title and description of one report inside a category group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportItem {
    pub title: String,
    pub description: String,
}

impl ReportItem {
    /// Bullet line fed to the summarizer.
    pub fn bullet(&self) -> String {
        format!("• {}: {}", self.title, self.description)
    }
}

/// Reports sharing one category, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub category: String,
    pub reports: Vec<ReportItem>,
}

impl CategoryGroup {
    /// Newline-joined bullet lines for every report in the group.
    pub fn combined_text(&self) -> String {
        self.reports
            .iter()
            .map(ReportItem::bullet)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One category's section of a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    /// Upper-cased category label
    pub category: String,
    pub report_count: usize,
    pub summary_text: String,
    /// True when the summary is the local truncation stand-in
    pub degraded: bool,
}

impl DigestEntry {
    pub fn render(&self) -> String {
        format!(
            "{} ({} reports):\n{}",
            self.category, self.report_count, self.summary_text
        )
    }
}

/// Ordered category summaries for leadership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub entries: Vec<DigestEntry>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total reports covered by the digest.
    pub fn report_count(&self) -> usize {
        self.entries.iter().map(|e| e.report_count).sum()
    }

    /// Entries whose summary fell back to truncation.
    pub fn degraded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.degraded).count()
    }

    /// Text form: rendered entries separated by a blank line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(DigestEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
