//! Database operations for the `price_history` table.

use chrono::{DateTime, Utc};
use hotdeal_core::PriceHistoryEntry;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub deal_id: String,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_rate: i32,
    pub crawled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PriceHistoryRow> for PriceHistoryEntry {
    fn from(row: PriceHistoryRow) -> Self {
        PriceHistoryEntry {
            deal_id: row.deal_id,
            price: row.price,
            original_price: row.original_price,
            discount_rate: row.discount_rate,
            crawled_at: row.crawled_at,
        }
    }
}

/// Appends price observations. The referenced deals must already exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the batch is rolled back.
pub async fn insert_price_history(
    pool: &PgPool,
    entries: &[PriceHistoryEntry],
) -> Result<usize, DbError> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(
            "INSERT INTO price_history (deal_id, price, original_price, discount_rate, crawled_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&entry.deal_id)
        .bind(entry.price)
        .bind(entry.original_price)
        .bind(entry.discount_rate)
        .bind(entry.crawled_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(entries.len())
}

/// Most recent observations for one deal, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_history(
    pool: &PgPool,
    deal_id: &str,
    limit: i64,
) -> Result<Vec<PriceHistoryEntry>, DbError> {
    let rows = sqlx::query_as::<_, PriceHistoryRow>(
        "SELECT id, deal_id, price, original_price, discount_rate, crawled_at, created_at \
         FROM price_history \
         WHERE deal_id = $1 \
         ORDER BY crawled_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(deal_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PriceHistoryEntry::from).collect())
}
