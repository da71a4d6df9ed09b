//! Time-based pruning of price history and crawl logs.
//!
//! Deals themselves are never pruned; they are overwritten in place by later
//! collections.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

/// Rows removed by one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub history_deleted: u64,
    pub logs_deleted: u64,
}

/// Deletes price history and crawl logs crawled before `cutoff`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either delete fails.
pub async fn cleanup_old_data(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<RetentionReport, DbError> {
    let history = sqlx::query("DELETE FROM price_history WHERE crawled_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    let logs = sqlx::query("DELETE FROM crawl_logs WHERE crawled_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(RetentionReport {
        history_deleted: history.rows_affected(),
        logs_deleted: logs.rows_affected(),
    })
}
