//! Backend switch between Postgres and the JSON file store.
//!
//! Callers hold a [`Storage`] and never branch on the backend themselves.

use chrono::{DateTime, Utc};
use hotdeal_core::{
    AppConfig, CollectionOutcome, CrawlLog, CrawlStats, Deal, PriceHistoryEntry, StorageBackend,
};
use sqlx::PgPool;

use crate::json_store::JsonStore;
use crate::retention::RetentionReport;
use crate::{connect_pool, crawl_logs, deals, price_history, retention, DbError, PoolConfig};

/// What [`Storage::record_outcome`] wrote before finishing or failing.
#[derive(Debug, Default)]
pub struct RecordReport {
    /// Deals upserted.
    pub stored: usize,
    /// Price history entries appended.
    pub history_written: usize,
    pub crawl_logged: bool,
    /// The write that stopped the sequence, if any.
    pub error: Option<DbError>,
}

#[derive(Debug, Clone)]
pub enum Storage {
    Postgres(PgPool),
    Json(JsonStore),
}

fn pg_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl Storage {
    /// Opens the backend selected by `config.storage`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingDatabaseUrl`] when Postgres is selected
    /// without a URL, [`DbError::Sqlx`] if the pool cannot connect, or
    /// [`DbError::Io`] if the data directory cannot be created.
    pub async fn connect(config: &AppConfig) -> Result<Self, DbError> {
        match config.storage {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or(DbError::MissingDatabaseUrl)?;
                let pool = connect_pool(url, PoolConfig::from_app_config(config)).await?;
                Ok(Self::Postgres(pool))
            }
            StorageBackend::Json => {
                let store = JsonStore::new(&config.data_dir);
                store.init().await?;
                Ok(Self::Json(store))
            }
        }
    }

    #[must_use]
    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Postgres(_) => StorageBackend::Postgres,
            Self::Json(_) => StorageBackend::Json,
        }
    }

    /// Applies pending migrations. The JSON backend has none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn migrate(&self) -> Result<usize, DbError> {
        match self {
            Self::Postgres(pool) => Ok(crate::run_migrations(pool).await?),
            Self::Json(_) => Ok(0),
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the backend is unreachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pool) => Ok(crate::ping(pool).await?),
            Self::Json(store) => store.health_check().await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn upsert_deals(&self, deals: &[Deal]) -> Result<usize, DbError> {
        if deals.is_empty() {
            return Ok(0);
        }
        match self {
            Self::Postgres(pool) => deals::upsert_deals(pool, deals).await,
            Self::Json(store) => store.upsert_deals(deals).await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn append_price_history(
        &self,
        entries: &[PriceHistoryEntry],
    ) -> Result<usize, DbError> {
        match self {
            Self::Postgres(pool) => price_history::insert_price_history(pool, entries).await,
            Self::Json(store) => store.append_price_history(entries).await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn record_crawl_log(&self, log: &CrawlLog) -> Result<(), DbError> {
        match self {
            Self::Postgres(pool) => crawl_logs::insert_crawl_log(pool, log).await,
            Self::Json(store) => store.append_crawl_log(log).await,
        }
    }

    /// Persists one source's collection result: upserts its deals, appends a
    /// price observation for every priced deal and writes the crawl log.
    ///
    /// The writes run in that order and stop at the first failure, which is
    /// returned in [`RecordReport::error`]. Counts for the writes that did
    /// complete are kept, so a failed history append still reports the deals
    /// that were upserted.
    pub async fn record_outcome(&self, outcome: &CollectionOutcome) -> RecordReport {
        let mut report = RecordReport::default();
        if let Err(e) = self.write_outcome(outcome, &mut report).await {
            report.error = Some(e);
        }
        report
    }

    async fn write_outcome(
        &self,
        outcome: &CollectionOutcome,
        report: &mut RecordReport,
    ) -> Result<(), DbError> {
        report.stored = self.upsert_deals(&outcome.deals).await?;

        let history: Vec<PriceHistoryEntry> = outcome
            .deals
            .iter()
            .filter_map(PriceHistoryEntry::from_deal)
            .collect();
        report.history_written = self.append_price_history(&history).await?;

        let log = CrawlLog {
            source: outcome.source.display_name.clone(),
            success: outcome.succeeded(),
            items_count: i32::try_from(outcome.deals.len()).unwrap_or(i32::MAX),
            error_message: outcome.error.clone(),
            crawled_at: outcome
                .deals
                .first()
                .map_or_else(Utc::now, |d| d.crawled_at),
        };
        self.record_crawl_log(&log).await?;
        report.crawl_logged = true;

        tracing::debug!(
            source = %outcome.source.name,
            stored = report.stored,
            history_written = report.history_written,
            success = log.success,
            "collection outcome recorded"
        );
        Ok(())
    }

    /// Priced deals first, then most recently crawled.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn latest_deals(&self, limit: usize) -> Result<Vec<Deal>, DbError> {
        match self {
            Self::Postgres(pool) => deals::list_latest_deals(pool, pg_limit(limit)).await,
            Self::Json(store) => store.latest_deals(limit).await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn deal_by_id(&self, id: &str) -> Result<Option<Deal>, DbError> {
        match self {
            Self::Postgres(pool) => deals::get_deal_by_id(pool, id).await,
            Self::Json(store) => store.deal_by_id(id).await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn price_history(
        &self,
        deal_id: &str,
        limit: usize,
    ) -> Result<Vec<PriceHistoryEntry>, DbError> {
        match self {
            Self::Postgres(pool) => {
                price_history::list_price_history(pool, deal_id, pg_limit(limit)).await
            }
            Self::Json(store) => store.price_history(deal_id, limit).await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn crawl_stats(&self, since: DateTime<Utc>) -> Result<Vec<CrawlStats>, DbError> {
        match self {
            Self::Postgres(pool) => crawl_logs::crawl_stats(pool, since).await,
            Self::Json(store) => store.crawl_stats(since).await,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if a delete fails.
    pub async fn cleanup_old_data(&self, cutoff: DateTime<Utc>) -> Result<RetentionReport, DbError> {
        let report = match self {
            Self::Postgres(pool) => retention::cleanup_old_data(pool, cutoff).await?,
            Self::Json(store) => store.cleanup_old_data(cutoff).await?,
        };
        tracing::info!(
            cutoff = %cutoff,
            history_deleted = report.history_deleted,
            logs_deleted = report.logs_deleted,
            "retention cleanup finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use hotdeal_core::{Category, SourceConfig, DELIVERY_UNKNOWN, NO_PRICE_TEXT};

    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "ppomppu".to_string(),
            display_name: "뽐뿌".to_string(),
            url: "http://www.ppomppu.co.kr/rss.php?id=ppomppu".to_string(),
            logo: "💰".to_string(),
            enabled: true,
        }
    }

    fn deal(id: &str, price: Option<i64>) -> Deal {
        let now = Utc::now();
        Deal {
            id: id.to_string(),
            title: id.to_string(),
            price,
            original_price: price,
            discount_rate: 0,
            has_price: price.is_some(),
            price_text: NO_PRICE_TEXT.to_string(),
            mall_name: "뽐뿌".to_string(),
            mall_logo: "💰".to_string(),
            category: Category::General,
            tags: vec![],
            url: String::new(),
            description: String::new(),
            pub_date: now,
            source: "RSS-뽐뿌".to_string(),
            delivery_info: DELIVERY_UNKNOWN.to_string(),
            crawled_at: now,
        }
    }

    #[tokio::test]
    async fn record_outcome_writes_deals_history_and_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::Json(JsonStore::new(dir.path()));
        let outcome = CollectionOutcome {
            source: source(),
            deals: vec![deal("ppomppu-1", Some(9_900)), deal("ppomppu-2", None)],
            error: None,
        };

        let report = storage.record_outcome(&outcome).await;
        assert!(report.error.is_none(), "unexpected error: {:?}", report.error);
        assert_eq!(report.stored, 2);
        assert_eq!(report.history_written, 1);
        assert!(report.crawl_logged);
        assert_eq!(storage.latest_deals(10).await.unwrap().len(), 2);
        assert_eq!(storage.price_history("ppomppu-1", 10).await.unwrap().len(), 1);
        assert!(storage.price_history("ppomppu-2", 10).await.unwrap().is_empty());

        let stats = storage
            .crawl_stats(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].source, "뽐뿌");
        assert_eq!(stats[0].successful_crawls, 1);
        assert_eq!(stats[0].total_items, 2);
    }

    #[tokio::test]
    async fn record_outcome_logs_failed_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::Json(JsonStore::new(dir.path()));
        let outcome = CollectionOutcome {
            source: source(),
            deals: vec![],
            error: Some("unexpected HTTP status 503".to_string()),
        };

        let report = storage.record_outcome(&outcome).await;
        assert!(report.error.is_none());
        assert_eq!(report.stored, 0);
        assert!(report.crawl_logged);
        let stats = storage
            .crawl_stats(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stats[0].total_crawls, 1);
        assert_eq!(stats[0].successful_crawls, 0);
    }

    #[tokio::test]
    async fn record_outcome_keeps_stored_count_when_history_write_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A directory where the history file should be makes the append fail.
        std::fs::create_dir(dir.path().join(crate::json_store::HISTORY_FILE)).expect("mkdir");
        let storage = Storage::Json(JsonStore::new(dir.path()));
        let outcome = CollectionOutcome {
            source: source(),
            deals: vec![deal("ppomppu-1", Some(9_900)), deal("ppomppu-2", None)],
            error: None,
        };

        let report = storage.record_outcome(&outcome).await;

        assert!(report.error.is_some());
        assert_eq!(report.stored, 2);
        assert_eq!(report.history_written, 0);
        assert!(!report.crawl_logged);
        assert_eq!(storage.latest_deals(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn json_backend_reports_itself() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::Json(JsonStore::new(dir.path()));
        assert_eq!(storage.backend(), StorageBackend::Json);
        assert_eq!(storage.migrate().await.unwrap(), 0);
        storage.health_check().await.unwrap();
    }
}
