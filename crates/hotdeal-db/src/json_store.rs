//! Flat-file storage: three JSON arrays in one data directory.
//!
//! Every array is kept newest first and capped, so the files stay small
//! enough to rewrite whole on each change. Writes go through a temp file and
//! a rename, and one async lock serializes read-modify-write cycles within
//! the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hotdeal_core::{CrawlLog, CrawlStats, Deal, PriceHistoryEntry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::retention::RetentionReport;
use crate::DbError;

pub const DEALS_FILE: &str = "deals.json";
pub const HISTORY_FILE: &str = "price-history.json";
pub const LOGS_FILE: &str = "crawl-logs.json";

pub const MAX_DEALS: usize = 1_000;
pub const MAX_HISTORY: usize = 5_000;
pub const MAX_LOGS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the directory cannot be created.
    pub async fn init(&self) -> Result<(), DbError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| DbError::Io {
                path: self.dir.clone(),
                source,
            })
    }

    /// Upserts deals by id. New deals go to the front; existing ones are
    /// replaced where they are.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read, parsed or written.
    pub async fn upsert_deals(&self, deals: &[Deal]) -> Result<usize, DbError> {
        let _guard = self.lock.lock().await;
        let mut stored: Vec<Deal> = self.read(DEALS_FILE).await?;

        for deal in deals {
            match stored.iter_mut().find(|d| d.id == deal.id) {
                Some(existing) => *existing = deal.clone(),
                None => stored.insert(0, deal.clone()),
            }
        }
        stored.truncate(MAX_DEALS);

        self.write(DEALS_FILE, &stored).await?;
        Ok(deals.len())
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read, parsed or written.
    pub async fn append_price_history(
        &self,
        entries: &[PriceHistoryEntry],
    ) -> Result<usize, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        let mut stored: Vec<PriceHistoryEntry> = self.read(HISTORY_FILE).await?;
        prepend(&mut stored, entries, MAX_HISTORY);
        self.write(HISTORY_FILE, &stored).await?;
        Ok(entries.len())
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read, parsed or written.
    pub async fn append_crawl_log(&self, log: &CrawlLog) -> Result<(), DbError> {
        let _guard = self.lock.lock().await;
        let mut stored: Vec<CrawlLog> = self.read(LOGS_FILE).await?;
        prepend(&mut stored, std::slice::from_ref(log), MAX_LOGS);
        self.write(LOGS_FILE, &stored).await
    }

    /// Priced deals first, then most recently crawled.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read or parsed.
    pub async fn latest_deals(&self, limit: usize) -> Result<Vec<Deal>, DbError> {
        let mut deals: Vec<Deal> = self.read(DEALS_FILE).await?;
        deals.sort_by(|a, b| {
            b.has_price
                .cmp(&a.has_price)
                .then_with(|| b.crawled_at.cmp(&a.crawled_at))
                .then_with(|| b.pub_date.cmp(&a.pub_date))
        });
        deals.truncate(limit);
        Ok(deals)
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read or parsed.
    pub async fn deal_by_id(&self, id: &str) -> Result<Option<Deal>, DbError> {
        let deals: Vec<Deal> = self.read(DEALS_FILE).await?;
        Ok(deals.into_iter().find(|d| d.id == id))
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read or parsed.
    pub async fn price_history(
        &self,
        deal_id: &str,
        limit: usize,
    ) -> Result<Vec<PriceHistoryEntry>, DbError> {
        let history: Vec<PriceHistoryEntry> = self.read(HISTORY_FILE).await?;
        Ok(history
            .into_iter()
            .filter(|h| h.deal_id == deal_id)
            .take(limit)
            .collect())
    }

    /// Per-source totals over logs crawled at or after `since`, ordered by
    /// source.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read or parsed.
    pub async fn crawl_stats(&self, since: DateTime<Utc>) -> Result<Vec<CrawlStats>, DbError> {
        let logs: Vec<CrawlLog> = self.read(LOGS_FILE).await?;
        Ok(aggregate_crawl_stats(
            logs.iter().filter(|log| log.crawled_at >= since),
        ))
    }

    /// Drops history entries and crawl logs crawled before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if either file cannot be read, parsed or written.
    pub async fn cleanup_old_data(&self, cutoff: DateTime<Utc>) -> Result<RetentionReport, DbError> {
        let _guard = self.lock.lock().await;

        let mut history: Vec<PriceHistoryEntry> = self.read(HISTORY_FILE).await?;
        let history_before = history.len();
        history.retain(|h| h.crawled_at >= cutoff);
        self.write(HISTORY_FILE, &history).await?;

        let mut logs: Vec<CrawlLog> = self.read(LOGS_FILE).await?;
        let logs_before = logs.len();
        logs.retain(|l| l.crawled_at >= cutoff);
        self.write(LOGS_FILE, &logs).await?;

        Ok(RetentionReport {
            history_deleted: (history_before - history.len()) as u64,
            logs_deleted: (logs_before - logs.len()) as u64,
        })
    }

    /// Verifies the data directory exists and is writable.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the probe file cannot be written.
    pub async fn health_check(&self) -> Result<(), DbError> {
        self.init().await?;
        let probe = self.dir.join(".health");
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|source| DbError::Io {
                path: probe.clone(),
                source,
            })?;
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|source| DbError::Io { path: probe, source })
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, DbError> {
        let path = self.dir.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(DbError::Io { path, source }),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| DbError::Json { path, source })
    }

    async fn write<T: Serialize>(&self, file: &str, items: &[T]) -> Result<(), DbError> {
        self.init().await?;
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));

        let body = serde_json::to_vec_pretty(items).map_err(|source| DbError::Json {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| DbError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| DbError::Io { path, source })
    }
}

fn prepend<T: Clone>(stored: &mut Vec<T>, newest: &[T], cap: usize) {
    let mut merged: Vec<T> = newest.iter().rev().cloned().collect();
    merged.append(stored);
    merged.truncate(cap);
    *stored = merged;
}

fn aggregate_crawl_stats<'a>(logs: impl Iterator<Item = &'a CrawlLog>) -> Vec<CrawlStats> {
    let mut stats: Vec<CrawlStats> = Vec::new();

    for log in logs {
        let idx = match stats.iter().position(|s| s.source == log.source) {
            Some(idx) => idx,
            None => {
                stats.push(CrawlStats {
                    source: log.source.clone(),
                    total_crawls: 0,
                    successful_crawls: 0,
                    total_items: 0,
                    last_crawl: None,
                });
                stats.len() - 1
            }
        };
        let entry = &mut stats[idx];
        entry.total_crawls += 1;
        if log.success {
            entry.successful_crawls += 1;
        }
        entry.total_items += i64::from(log.items_count);
        if entry.last_crawl.is_none_or(|last| log.crawled_at > last) {
            entry.last_crawl = Some(log.crawled_at);
        }
    }

    stats.sort_by(|a, b| a.source.cmp(&b.source));
    stats
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use hotdeal_core::{Category, DELIVERY_UNKNOWN};

    use super::*;

    fn at(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap() + Duration::minutes(mins)
    }

    fn deal(id: &str, price: Option<i64>, crawled_min: i64) -> Deal {
        Deal {
            id: id.to_string(),
            title: format!("deal {id}"),
            price,
            original_price: price,
            discount_rate: 0,
            has_price: price.is_some(),
            price_text: String::new(),
            mall_name: "뽐뿌".to_string(),
            mall_logo: "💰".to_string(),
            category: Category::General,
            tags: vec![],
            url: format!("https://example.com/{id}"),
            description: String::new(),
            pub_date: at(crawled_min),
            source: "RSS-뽐뿌".to_string(),
            delivery_info: DELIVERY_UNKNOWN.to_string(),
            crawled_at: at(crawled_min),
        }
    }

    fn log(source: &str, success: bool, items: i32, min: i64) -> CrawlLog {
        CrawlLog {
            source: source.to_string(),
            success,
            items_count: items,
            error_message: (!success).then(|| "boom".to_string()),
            crawled_at: at(min),
        }
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path().join("nested"));
        assert!(store.latest_deals(10).await.unwrap().is_empty());
        assert!(store.deal_by_id("x").await.unwrap().is_none());
        assert!(store.crawl_stats(at(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_in_place_and_prepends_new() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());

        store
            .upsert_deals(&[deal("a-1", Some(1_000), 0), deal("a-2", None, 0)])
            .await
            .unwrap();
        let mut updated = deal("a-1", Some(900), 10);
        updated.title = "updated".to_string();
        store
            .upsert_deals(&[updated, deal("a-3", Some(5), 10)])
            .await
            .unwrap();

        let raw: Vec<Deal> = store.read(DEALS_FILE).await.unwrap();
        let ids: Vec<_> = raw.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a-3", "a-2", "a-1"]);

        let a1 = store.deal_by_id("a-1").await.unwrap().expect("a-1");
        assert_eq!(a1.title, "updated");
        assert_eq!(a1.price, Some(900));
    }

    #[tokio::test]
    async fn latest_deals_puts_priced_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());
        store
            .upsert_deals(&[
                deal("a-1", Some(1_000), 0),
                deal("a-2", None, 30),
                deal("a-3", Some(2_000), 20),
            ])
            .await
            .unwrap();

        let ids: Vec<_> = store
            .latest_deals(10)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a-3", "a-1", "a-2"]);
        assert_eq!(store.latest_deals(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deals_are_capped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());
        let deals: Vec<_> = (0..MAX_DEALS + 5)
            .map(|i| deal(&format!("d-{i}"), Some(100), 0))
            .collect();
        store.upsert_deals(&deals).await.unwrap();
        let stored: Vec<Deal> = store.read(DEALS_FILE).await.unwrap();
        assert_eq!(stored.len(), MAX_DEALS);
        assert_eq!(stored[0].id, format!("d-{}", MAX_DEALS + 4));
    }

    #[tokio::test]
    async fn price_history_is_newest_first_per_deal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());
        let entry = |id: &str, price: i64, min: i64| PriceHistoryEntry {
            deal_id: id.to_string(),
            price: Some(price),
            original_price: Some(price),
            discount_rate: 0,
            crawled_at: at(min),
        };

        store
            .append_price_history(&[entry("a-1", 1_000, 0), entry("b-1", 50, 0)])
            .await
            .unwrap();
        store
            .append_price_history(&[entry("a-1", 900, 10)])
            .await
            .unwrap();

        let history = store.price_history("a-1", 10).await.unwrap();
        let prices: Vec<_> = history.iter().map(|h| h.price).collect();
        assert_eq!(prices, vec![Some(900), Some(1_000)]);
        assert_eq!(store.price_history("a-1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn crawl_stats_aggregates_window() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());
        for l in [
            log("뽐뿌", true, 15, 0),
            log("뽐뿌", false, 0, 10),
            log("루리웹", true, 12, 20),
            log("뽐뿌", true, 14, -600),
        ] {
            store.append_crawl_log(&l).await.unwrap();
        }

        let stats = store.crawl_stats(at(-60)).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].source, "루리웹");
        let ppomppu = &stats[1];
        assert_eq!(ppomppu.source, "뽐뿌");
        assert_eq!(ppomppu.total_crawls, 2);
        assert_eq!(ppomppu.successful_crawls, 1);
        assert_eq!(ppomppu.total_items, 15);
        assert_eq!(ppomppu.last_crawl, Some(at(10)));
    }

    #[tokio::test]
    async fn cleanup_drops_old_history_and_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());
        store.append_crawl_log(&log("뽐뿌", true, 1, -100)).await.unwrap();
        store.append_crawl_log(&log("뽐뿌", true, 1, 0)).await.unwrap();
        store
            .append_price_history(&[PriceHistoryEntry {
                deal_id: "a-1".to_string(),
                price: Some(1),
                original_price: Some(1),
                discount_rate: 0,
                crawled_at: at(-100),
            }])
            .await
            .unwrap();

        let report = store.cleanup_old_data(at(-50)).await.unwrap();
        assert_eq!(
            report,
            RetentionReport {
                history_deleted: 1,
                logs_deleted: 1
            }
        );
        assert_eq!(store.crawl_stats(at(-1_000)).await.unwrap()[0].total_crawls, 1);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(DEALS_FILE), "{not json").unwrap();
        let store = JsonStore::new(dir.path());
        assert!(matches!(
            store.latest_deals(10).await,
            Err(DbError::Json { .. })
        ));
    }

    #[tokio::test]
    async fn health_check_creates_nothing_permanent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path());
        store.health_check().await.expect("writable");
        assert!(!dir.path().join(".health").exists());
    }
}
