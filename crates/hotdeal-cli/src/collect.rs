//! `collect` command: one collection pass over the configured feeds.
//!
//! A failing source is reported and skipped; the command only fails when
//! every selected source failed.

use hotdeal_core::{AppConfig, CollectionOutcome};
use hotdeal_db::Storage;
use hotdeal_scraper::{collect_all, FeedClient};

use crate::query::format_deal_line;

pub(crate) async fn run_collect(
    config: &AppConfig,
    source_filter: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let sources = hotdeal_core::load_sources(&config.sources_path)?.enabled(source_filter);
    if sources.is_empty() {
        if let Some(name) = source_filter {
            anyhow::bail!("source '{name}' is not configured or is disabled");
        }
        println!("no enabled sources configured; nothing to collect");
        return Ok(());
    }

    let client = FeedClient::new(
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
        config.scraper_max_retries,
        config.scraper_retry_backoff_base_secs,
    )?;
    let outcomes = collect_all(&client, &sources, config.max_items_per_source).await;

    if dry_run {
        for outcome in &outcomes {
            println!("{}", format_outcome(outcome, None));
            for deal in &outcome.deals {
                println!("  {}", format_deal_line(deal));
            }
        }
        println!("dry-run: nothing written");
        return Ok(());
    }

    let storage = Storage::connect(config).await?;
    let mut stored_total = 0;
    for outcome in &outcomes {
        let report = storage.record_outcome(outcome).await;
        stored_total += report.stored;
        println!("{}", format_outcome(outcome, Some(report.stored)));
        if let Some(e) = &report.error {
            tracing::error!(source = %outcome.source.name, error = %e, "failed to store deals");
            println!("  storage error after {} stored: {e}", report.stored);
        }
    }

    let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
    println!(
        "collected {} source(s), stored {stored_total} deal(s), {failed} failed",
        outcomes.len()
    );

    if failed == outcomes.len() {
        anyhow::bail!("all {failed} sources failed collection");
    }
    Ok(())
}

fn format_outcome(outcome: &CollectionOutcome, stored: Option<usize>) -> String {
    let label = format!("{} {}", outcome.source.logo, outcome.source.display_name);
    match &outcome.error {
        Some(error) => format!("{} failed: {error}", label.trim()),
        None => {
            let with_price = outcome.deals.iter().filter(|d| d.has_price).count();
            let stored = stored.map_or_else(String::new, |n| format!(", {n} stored"));
            format!(
                "{}: {} deal(s), {with_price} with price{stored}",
                label.trim(),
                outcome.deals.len()
            )
        }
    }
}
