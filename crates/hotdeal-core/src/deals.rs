//! Domain records shared by the collector, the storage backends and the API.
//!
//! Every struct here serializes in camelCase, which is the on-disk shape of
//! the JSON file store and the API payload shape. The Postgres adapter maps
//! the same fields to snake_case columns.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::sources::SourceConfig;

/// `price_text` shown when no price could be extracted.
pub const NO_PRICE_TEXT: &str = "가격 정보 없음";
/// Delivery label when a free-shipping marker is present.
pub const DELIVERY_FREE: &str = "무료배송";
/// Delivery label when a paid-shipping marker is present.
pub const DELIVERY_PAID: &str = "유료배송";
/// Delivery label when shipping terms must be checked on the source post.
pub const DELIVERY_UNKNOWN: &str = "원문 확인";

/// Structured price information pulled out of a deal title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_rate: i32,
    pub has_price: bool,
    pub price_text: String,
    pub delivery_info: String,
}

impl PriceInfo {
    /// The "no price" record: not an error, just nothing to show.
    #[must_use]
    pub fn none() -> Self {
        Self {
            price: None,
            original_price: None,
            discount_rate: 0,
            has_price: false,
            price_text: NO_PRICE_TEXT.to_string(),
            delivery_info: DELIVERY_UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tech,
    Fashion,
    Food,
    Living,
    Health,
    Gaming,
    General,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Tech,
        Category::Fashion,
        Category::Food,
        Category::Living,
        Category::Health,
        Category::Gaming,
        Category::General,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tech => "tech",
            Category::Fashion => "fashion",
            Category::Food => "food",
            Category::Living => "living",
            Category::Health => "health",
            Category::Gaming => "gaming",
            Category::General => "general",
        }
    }

    /// Korean search aliases for the category.
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Category::Tech => &["전자", "디지털", "가전", "컴퓨터"],
            Category::Fashion => &["패션", "의류"],
            Category::Food => &["식품", "음식", "먹거리"],
            Category::Living => &["생활", "리빙", "홈"],
            Category::Health => &["건강", "뷰티"],
            Category::Gaming => &["게임"],
            Category::General => &["기타"],
        }
    }

    /// Parses a stored category name. Unknown names map to `General` so rows
    /// written by older collectors still load.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Category::General)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw entry from a content feed, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Publish date exactly as the feed reported it (RFC 2822 or RFC 3339).
    pub pub_date: Option<String>,
    /// Content snippet or description, possibly containing HTML.
    pub description: Option<String>,
}

/// The canonical deal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub title: String,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_rate: i32,
    pub has_price: bool,
    pub price_text: String,
    pub mall_name: String,
    pub mall_logo: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub url: String,
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub source: String,
    pub delivery_info: String,
    pub crawled_at: DateTime<Utc>,
}

/// A price observation recorded for a deal at collection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub deal_id: String,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_rate: i32,
    pub crawled_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    /// Builds a history entry from a deal, or `None` when the deal has no price.
    #[must_use]
    pub fn from_deal(deal: &Deal) -> Option<Self> {
        deal.price.map(|price| Self {
            deal_id: deal.id.clone(),
            price: Some(price),
            original_price: deal.original_price,
            discount_rate: deal.discount_rate,
            crawled_at: deal.crawled_at,
        })
    }
}

/// One collection attempt against one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlLog {
    pub source: String,
    pub success: bool,
    pub items_count: i32,
    pub error_message: Option<String>,
    pub crawled_at: DateTime<Utc>,
}

/// Per-source aggregate over recent crawl logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub source: String,
    pub total_crawls: i64,
    pub successful_crawls: i64,
    pub total_items: i64,
    pub last_crawl: Option<DateTime<Utc>>,
}

/// Result of collecting one source: its deals, or the error that stopped it.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub source: SourceConfig,
    pub deals: Vec<Deal>,
    pub error: Option<String>,
}

impl CollectionOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Formats a won amount with thousands separators: `22500` -> `"22,500원"`.
#[must_use]
pub fn format_won(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if amount < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push('원');
    out
}

/// Start of a lookback window `span` long ending at `now`.
///
/// Returns `None` when `span` is negative or the start falls outside the
/// range `DateTime<Utc>` can represent.
#[must_use]
fn window_start(now: DateTime<Utc>, span: TimeDelta) -> Option<DateTime<Utc>> {
    if span < TimeDelta::zero() {
        return None;
    }
    now.checked_sub_signed(span)
}

/// [`window_start`] for a span in whole days.
#[must_use]
pub fn days_before(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(days).and_then(|span| window_start(now, span))
}

/// [`window_start`] for a span in whole hours.
#[must_use]
pub fn hours_before(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_hours(hours).and_then(|span| window_start(now, span))
}
