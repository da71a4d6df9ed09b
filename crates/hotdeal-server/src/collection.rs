//! One full collection pass: fetch every enabled source, persist each
//! outcome and report what happened.

use chrono::{DateTime, Utc};
use hotdeal_core::{CollectionOutcome, SourceConfig};
use hotdeal_db::{RecordReport, Storage};
use hotdeal_scraper::{collect_all, FeedClient};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub display_name: String,
    pub success: bool,
    pub items: usize,
    pub with_price: usize,
    /// Deals upserted, even when a later history or crawl-log write failed.
    pub stored: usize,
    pub error: Option<String>,
    /// Storage failure after collection, reported separately from `error`.
    pub persist_error: Option<String>,
}

impl SourceSummary {
    fn new(outcome: &CollectionOutcome, report: &RecordReport) -> Self {
        Self {
            source: outcome.source.name.clone(),
            display_name: outcome.source.display_name.clone(),
            success: outcome.succeeded(),
            items: outcome.deals.len(),
            with_price: outcome.deals.iter().filter(|d| d.has_price).count(),
            stored: report.stored,
            error: outcome.error.clone(),
            persist_error: report.error.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_deals: usize,
    pub with_price: usize,
    pub failed_sources: usize,
    pub sources: Vec<SourceSummary>,
}

/// Collects all `sources` and writes each outcome to `storage`.
///
/// A source whose writes fail is logged and reported with `persist_error`,
/// keeping the count of deals upserted before the failure; the remaining
/// sources are still written.
pub async fn run_collection(
    storage: &Storage,
    client: &FeedClient,
    sources: &[SourceConfig],
    max_items: usize,
) -> CollectionSummary {
    let started_at = Utc::now();
    tracing::info!(sources = sources.len(), "collection run started");

    let outcomes = collect_all(client, sources, max_items).await;

    let mut summaries = Vec::with_capacity(outcomes.len());
    for outcome in &outcomes {
        let report = storage.record_outcome(outcome).await;
        if let Some(e) = &report.error {
            tracing::error!(
                source = %outcome.source.name,
                stored = report.stored,
                error = %e,
                "failed to persist collection outcome"
            );
        }
        summaries.push(SourceSummary::new(outcome, &report));
    }

    let summary = CollectionSummary {
        started_at,
        finished_at: Utc::now(),
        total_deals: summaries.iter().map(|s| s.items).sum(),
        with_price: summaries.iter().map(|s| s.with_price).sum(),
        failed_sources: summaries.iter().filter(|s| !s.success).count(),
        sources: summaries,
    };

    tracing::info!(
        total_deals = summary.total_deals,
        with_price = summary.with_price,
        failed_sources = summary.failed_sources,
        "collection run complete"
    );
    summary
}
