//! Read-only commands over stored deals plus the retention cleanup.

use chrono::Utc;
use hotdeal_core::{
    days_before, filter_deals, hours_before, search_deals, sort_deals, Category, Deal, DealFilter,
    SortBy,
};
use hotdeal_db::Storage;
use hotdeal_scraper::{extract_price_info, normalize::recency_label, sort_for_display};

/// Deals scanned by `deals` before search and filtering.
const SCAN_LIMIT: usize = 1_000;

pub(crate) async fn run_deals(
    storage: &Storage,
    limit: usize,
    query: Option<&str>,
    category: Option<&str>,
    sort: Option<&str>,
) -> anyhow::Result<()> {
    let category = category.map(parse_category).transpose()?;
    let sort = sort
        .map(str::parse::<SortBy>)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let mut deals = storage.latest_deals(SCAN_LIMIT).await?;
    sort_for_display(&mut deals);
    if let Some(query) = query {
        deals = search_deals(&deals, query);
    }
    let mut deals = filter_deals(
        &deals,
        &DealFilter {
            category,
            ..DealFilter::default()
        },
    );
    if let Some(sort) = sort {
        sort_deals(&mut deals, sort);
    }

    if deals.is_empty() {
        println!("no deals found");
        return Ok(());
    }

    let total = deals.len();
    for deal in deals.iter().take(limit) {
        println!("{}", format_deal_line(deal));
    }
    println!("showing {} of {total}", total.min(limit));
    Ok(())
}

pub(crate) fn run_extract(title: &str, source: &str) -> anyhow::Result<()> {
    let info = extract_price_info(title, source);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

pub(crate) async fn run_history(storage: &Storage, id: &str, limit: usize) -> anyhow::Result<()> {
    let deal = storage
        .deal_by_id(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("deal '{id}' not found"))?;
    println!("{}", format_deal_line(&deal));

    let history = storage.price_history(id, limit).await?;
    if history.is_empty() {
        println!("  no price history recorded");
    }
    for entry in &history {
        let price = entry
            .price
            .map_or_else(|| "-".to_string(), hotdeal_core::format_won);
        println!(
            "  {}  {price}  ({}% off)",
            entry.crawled_at.format("%Y-%m-%d %H:%M"),
            entry.discount_rate
        );
    }
    Ok(())
}

pub(crate) async fn run_stats(storage: &Storage, hours: i64) -> anyhow::Result<()> {
    let since = hours_before(Utc::now(), hours.max(1))
        .ok_or_else(|| anyhow::anyhow!("--hours {hours} is out of range"))?;
    let stats = storage.crawl_stats(since).await?;
    if stats.is_empty() {
        println!("no crawls in the last {hours}h");
        return Ok(());
    }

    for s in &stats {
        let last = s
            .last_crawl
            .map_or_else(|| "never".to_string(), |t| recency_label(t, Utc::now()));
        println!(
            "{}: {}/{} successful, {} items, last {last}",
            s.source, s.successful_crawls, s.total_crawls, s.total_items
        );
    }
    Ok(())
}

pub(crate) async fn run_cleanup(storage: &Storage, days: u32) -> anyhow::Result<()> {
    let cutoff = days_before(Utc::now(), i64::from(days))
        .ok_or_else(|| anyhow::anyhow!("--days {days} is out of range"))?;
    let report = storage.cleanup_old_data(cutoff).await?;
    println!(
        "removed {} price history entries and {} crawl logs older than {days} day(s)",
        report.history_deleted, report.logs_deleted
    );
    Ok(())
}

/// One-line summary: `[id] price_text (discount) mall: title`.
pub(crate) fn format_deal_line(deal: &Deal) -> String {
    let discount = if deal.discount_rate > 0 {
        format!(" -{}%", deal.discount_rate)
    } else {
        String::new()
    };
    format!(
        "[{}] {}{discount} {} {}: {}",
        deal.id, deal.price_text, deal.mall_logo, deal.mall_name, deal.title
    )
}

fn parse_category(name: &str) -> anyhow::Result<Category> {
    Category::ALL
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| anyhow::anyhow!("unknown category '{name}'"))
}
