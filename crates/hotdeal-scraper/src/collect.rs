//! Feed collection: fetch each source, extract prices, normalize deals.
//!
//! A failing source never aborts the run. Its outcome carries the error so
//! the caller can record a failed crawl and carry on with the others.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use hotdeal_core::{CollectionOutcome, Deal, FeedItem, SourceConfig};

use crate::extract::extract_price_info;
use crate::feed::FeedClient;
use crate::normalize::normalize_deal;

const MAX_CONCURRENT_SOURCES: usize = 4;

/// Normalizes the first `max_items` feed items of one source. Ordinals are
/// 1-based in feed order.
#[must_use]
pub fn build_deals(
    items: &[FeedItem],
    source: &SourceConfig,
    max_items: usize,
    crawled_at: DateTime<Utc>,
) -> Vec<Deal> {
    items
        .iter()
        .take(max_items)
        .enumerate()
        .map(|(index, item)| {
            let price = extract_price_info(item.title.as_deref().unwrap_or_default(), &source.name);
            normalize_deal(item, &price, source, index + 1, crawled_at)
        })
        .collect()
}

/// Fetches and normalizes one source. An empty feed counts as a failure.
pub async fn collect_source(
    client: &FeedClient,
    source: &SourceConfig,
    max_items: usize,
) -> CollectionOutcome {
    tracing::info!(source = %source.name, url = %source.url, "fetching feed");

    match client.fetch_items(&source.url).await {
        Ok(items) if items.is_empty() => {
            tracing::warn!(source = %source.name, "feed returned no items");
            CollectionOutcome {
                source: source.clone(),
                deals: Vec::new(),
                error: Some("no feed items found".to_string()),
            }
        }
        Ok(items) => {
            let deals = build_deals(&items, source, max_items, Utc::now());
            let with_price = deals.iter().filter(|d| d.has_price).count();
            tracing::info!(
                source = %source.name,
                items = items.len(),
                deals = deals.len(),
                with_price,
                "feed collected"
            );
            CollectionOutcome {
                source: source.clone(),
                deals,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(source = %source.name, error = %e, "feed collection failed");
            CollectionOutcome {
                source: source.clone(),
                deals: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Collects every source concurrently. Outcomes come back in `sources` order.
pub async fn collect_all(
    client: &FeedClient,
    sources: &[SourceConfig],
    max_items: usize,
) -> Vec<CollectionOutcome> {
    let fetches: Vec<_> = sources
        .iter()
        .map(|source| collect_source(client, source, max_items))
        .collect();
    stream::iter(fetches)
        .buffered(MAX_CONCURRENT_SOURCES)
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "ruliweb".to_string(),
            display_name: "루리웹".to_string(),
            url: "https://bbs.ruliweb.com/market/board/1020/rss".to_string(),
            logo: "🎮".to_string(),
            enabled: true,
        }
    }

    fn item(title: &str) -> FeedItem {
        FeedItem {
            title: Some(title.to_string()),
            ..FeedItem::default()
        }
    }

    #[test]
    fn build_deals_caps_and_numbers_items() {
        let items: Vec<_> = (0..20).map(|i| item(&format!("상품 {i} (1,000원)"))).collect();
        let crawled_at = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let deals = build_deals(&items, &source(), 15, crawled_at);

        assert_eq!(deals.len(), 15);
        assert_eq!(deals[0].id, "ruliweb-1");
        assert_eq!(deals[14].id, "ruliweb-15");
        assert!(deals.iter().all(|d| d.has_price && d.crawled_at == crawled_at));
    }

    #[test]
    fn build_deals_keeps_items_without_price() {
        let items = vec![item("가격 미정 상품"), item("닌텐도 스위치 (298,000원/무배)")];
        let deals = build_deals(&items, &source(), 15, Utc::now());
        assert_eq!(deals.len(), 2);
        assert!(!deals[0].has_price);
        assert_eq!(deals[1].price, Some(298_000));
        assert_eq!(deals[1].mall_name, "루리웹");
    }
}
