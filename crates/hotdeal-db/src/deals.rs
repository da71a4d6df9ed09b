//! Database operations for the `deals` table.

use chrono::{DateTime, Utc};
use hotdeal_core::{Category, Deal};
use sqlx::PgPool;

use crate::DbError;

const DEAL_COLUMNS: &str = "id, title, price, original_price, discount_rate, has_price, \
     price_text, mall_name, mall_logo, category, tags, url, description, pub_date, source, \
     delivery_info, crawled_at, created_at, updated_at";

/// A row from the `deals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DealRow {
    pub id: String,
    pub title: String,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_rate: i32,
    pub has_price: bool,
    pub price_text: String,
    pub mall_name: String,
    pub mall_logo: String,
    /// Lowercase [`Category`] name.
    pub category: String,
    pub tags: Vec<String>,
    pub url: String,
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub source: String,
    pub delivery_info: String,
    pub crawled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DealRow> for Deal {
    fn from(row: DealRow) -> Self {
        Deal {
            id: row.id,
            title: row.title,
            price: row.price,
            original_price: row.original_price,
            discount_rate: row.discount_rate,
            has_price: row.has_price,
            price_text: row.price_text,
            mall_name: row.mall_name,
            mall_logo: row.mall_logo,
            category: Category::from_name(&row.category),
            tags: row.tags,
            url: row.url,
            description: row.description,
            pub_date: row.pub_date,
            source: row.source,
            delivery_info: row.delivery_info,
            crawled_at: row.crawled_at,
        }
    }
}

/// Upserts a batch of deals in one transaction.
///
/// Conflicts on `id` overwrite every field and bump `updated_at`; `created_at`
/// keeps the first-seen time. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the whole batch is
/// rolled back.
pub async fn upsert_deals(pool: &PgPool, deals: &[Deal]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for deal in deals {
        sqlx::query(
            "INSERT INTO deals \
                 (id, title, price, original_price, discount_rate, has_price, price_text, \
                  mall_name, mall_logo, category, tags, url, description, pub_date, source, \
                  delivery_info, crawled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             ON CONFLICT (id) DO UPDATE SET \
                 title          = EXCLUDED.title, \
                 price          = EXCLUDED.price, \
                 original_price = EXCLUDED.original_price, \
                 discount_rate  = EXCLUDED.discount_rate, \
                 has_price      = EXCLUDED.has_price, \
                 price_text     = EXCLUDED.price_text, \
                 mall_name      = EXCLUDED.mall_name, \
                 mall_logo      = EXCLUDED.mall_logo, \
                 category       = EXCLUDED.category, \
                 tags           = EXCLUDED.tags, \
                 url            = EXCLUDED.url, \
                 description    = EXCLUDED.description, \
                 pub_date       = EXCLUDED.pub_date, \
                 source         = EXCLUDED.source, \
                 delivery_info  = EXCLUDED.delivery_info, \
                 crawled_at     = EXCLUDED.crawled_at, \
                 updated_at     = NOW()",
        )
        .bind(&deal.id)
        .bind(&deal.title)
        .bind(deal.price)
        .bind(deal.original_price)
        .bind(deal.discount_rate)
        .bind(deal.has_price)
        .bind(&deal.price_text)
        .bind(&deal.mall_name)
        .bind(&deal.mall_logo)
        .bind(deal.category.as_str())
        .bind(&deal.tags)
        .bind(&deal.url)
        .bind(&deal.description)
        .bind(deal.pub_date)
        .bind(&deal.source)
        .bind(&deal.delivery_info)
        .bind(deal.crawled_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(deals.len())
}

/// Lists the most recent deals, priced deals first, then by crawl time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_latest_deals(pool: &PgPool, limit: i64) -> Result<Vec<Deal>, DbError> {
    let rows = sqlx::query_as::<_, DealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals \
         ORDER BY has_price DESC, crawled_at DESC, pub_date DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Deal::from).collect())
}

/// Fetches one deal by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_deal_by_id(pool: &PgPool, id: &str) -> Result<Option<Deal>, DbError> {
    let row = sqlx::query_as::<_, DealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Deal::from))
}
