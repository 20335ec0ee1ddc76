//! Category digest aggregation.
//!
//! Reports are partitioned by category in first-seen order, each group is
//! summarized on its own task, and results are written back into a slot
//! vector indexed by group position. Completion order never affects output
//! order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use civic_common::util::truncate_with_ellipsis;
use civic_common::DigestConfig;

use crate::error::PipelineError;
use crate::summarizer::SummarizerClient;
use crate::types::{CategoryGroup, Digest, DigestEntry, Report, ReportItem};

/// Partition reports by exact category key.
///
/// Groups appear in the order their category is first seen; reports keep
/// their input order within a group.
pub fn group_by_category(reports: &[Report]) -> Vec<CategoryGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<CategoryGroup> = Vec::new();

    for report in reports {
        let slot = *index.entry(report.category.as_str()).or_insert_with(|| {
            groups.push(CategoryGroup {
                category: report.category.clone(),
                reports: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].reports.push(ReportItem {
            title: report.title.clone(),
            description: report.description.clone(),
        });
    }

    groups
}

/// Builds per-category digests with bounded concurrent summarization.
#[derive(Clone)]
pub struct DigestAggregator {
    summarizer: SummarizerClient,
    max_concurrency: usize,
    max_length: usize,
    min_length: usize,
}

impl DigestAggregator {
    pub fn new(
        summarizer: SummarizerClient,
        max_concurrency: usize,
        max_length: usize,
        min_length: usize,
    ) -> Self {
        Self {
            summarizer,
            max_concurrency: max_concurrency.max(1),
            max_length,
            min_length,
        }
    }

    pub fn from_config(summarizer: SummarizerClient, config: &DigestConfig) -> Self {
        Self::new(
            summarizer,
            config.max_concurrency,
            config.max_length,
            config.min_length,
        )
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Build a digest that runs to completion.
    pub async fn build_digest(&self, reports: &[Report]) -> Result<Digest, PipelineError> {
        self.build_digest_with_cancel(reports, CancellationToken::new())
            .await
    }

    /// Build a digest, aborting every in-flight summarization if `cancel` fires.
    ///
    /// A cancelled build returns [`PipelineError::Cancelled`] and no partial digest.
    pub async fn build_digest_with_cancel(
        &self,
        reports: &[Report],
        cancel: CancellationToken,
    ) -> Result<Digest, PipelineError> {
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(PipelineError::InvalidInput(format!(
                "digest length bounds are invalid (min {}, max {})",
                self.min_length, self.max_length
            )));
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let groups = group_by_category(reports);
        if groups.is_empty() {
            return Ok(Digest::default());
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(usize, DigestEntry)> = JoinSet::new();

        for (idx, group) in groups.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let summarizer = self.summarizer.clone();
            let category = group.category.to_uppercase();
            let report_count = group.reports.len();
            let text = group.combined_text();
            let (max_length, min_length) = (self.max_length, self.min_length);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let entry = match summarizer
                    .summarize_detailed(&text, max_length, min_length)
                    .await
                {
                    Ok(summary) => DigestEntry {
                        category,
                        report_count,
                        summary_text: summary.text,
                        degraded: summary.degraded,
                    },
                    Err(e) => {
                        tracing::warn!(category = %category, error = %e, "Summary rejected, truncating group");
                        DigestEntry {
                            category,
                            report_count,
                            summary_text: truncate_with_ellipsis(&text, max_length),
                            degraded: true,
                        }
                    }
                };
                (idx, entry)
            });
        }

        let mut slots: Vec<Option<DigestEntry>> = vec![None; groups.len()];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    tracing::info!(
                        groups = groups.len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Digest cancelled"
                    );
                    return Err(PipelineError::Cancelled);
                }

                next = tasks.join_next() => match next {
                    Some(Ok((idx, entry))) => slots[idx] = Some(entry),
                    Some(Err(join_error)) => {
                        tracing::error!(error = %join_error, "Digest group task failed");
                    }
                    None => break,
                },
            }
        }

        // A group whose task died still gets its truncation entry
        let entries: Vec<DigestEntry> = slots
            .into_iter()
            .zip(groups.iter())
            .map(|(slot, group)| {
                slot.unwrap_or_else(|| DigestEntry {
                    category: group.category.to_uppercase(),
                    report_count: group.reports.len(),
                    summary_text: truncate_with_ellipsis(&group.combined_text(), self.max_length),
                    degraded: true,
                })
            })
            .collect();

        let digest = Digest { entries };
        tracing::info!(
            reports = reports.len(),
            groups = digest.entries.len(),
            degraded = digest.degraded_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Digest built"
        );

        Ok(digest)
    }
}
