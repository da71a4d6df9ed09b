//! Database operations for the `crawl_logs` table.

use chrono::{DateTime, Utc};
use hotdeal_core::{CrawlLog, CrawlStats};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct CrawlStatsRow {
    source: String,
    total_crawls: i64,
    successful_crawls: i64,
    total_items: i64,
    last_crawl: Option<DateTime<Utc>>,
}

/// Records one collection attempt.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_crawl_log(pool: &PgPool, log: &CrawlLog) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO crawl_logs (source, success, items_count, error_message, crawled_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&log.source)
    .bind(log.success)
    .bind(log.items_count)
    .bind(&log.error_message)
    .bind(log.crawled_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Per-source totals over logs crawled at or after `since`, ordered by source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn crawl_stats(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<CrawlStats>, DbError> {
    let rows = sqlx::query_as::<_, CrawlStatsRow>(
        "SELECT source, \
                COUNT(*)::BIGINT                               AS total_crawls, \
                COUNT(*) FILTER (WHERE success)::BIGINT        AS successful_crawls, \
                COALESCE(SUM(items_count), 0)::BIGINT          AS total_items, \
                MAX(crawled_at)                                AS last_crawl \
         FROM crawl_logs \
         WHERE crawled_at >= $1 \
         GROUP BY source \
         ORDER BY source",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| CrawlStats {
            source: row.source,
            total_crawls: row.total_crawls,
            successful_crawls: row.successful_crawls,
            total_items: row.total_items,
            last_crawl: row.last_crawl,
        })
        .collect())
}
