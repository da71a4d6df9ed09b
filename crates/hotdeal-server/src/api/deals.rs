use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use hotdeal_cache::keys;
use hotdeal_core::{
    filter_deals, search_deals, sort_deals, Category, Deal, DealFilter, PriceHistoryEntry, SortBy,
};
use hotdeal_scraper::{normalize::recency_label, sort_for_display};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

/// Newest crawl older than this marks the listing as due for a refresh.
const STALE_AFTER_MINUTES: i64 = 15;
/// Deals loaded from storage into the listing cache.
const LISTING_LOAD_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub(super) struct DealQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    /// Comma-separated mall names.
    pub mall: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_discount: Option<i32>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct DealListMeta {
    #[serde(flatten)]
    base: ResponseMeta,
    total: usize,
    with_price: usize,
    age_minutes: Option<i64>,
    needs_update: bool,
    cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DealDetail {
    #[serde(flatten)]
    deal: Deal,
    time_ago: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    pub limit: Option<i64>,
}

pub(super) async fn list_deals(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DealQuery>,
) -> Result<Json<ApiResponse<Vec<Deal>, DealListMeta>>, ApiError> {
    let filter =
        build_filter(&query).map_err(|msg| ApiError::new(req_id.0.clone(), "bad_request", msg))?;
    let sort = query
        .sort
        .as_deref()
        .map(str::parse::<SortBy>)
        .transpose()
        .map_err(|msg| ApiError::new(req_id.0.clone(), "bad_request", msg))?;

    let loaded = AtomicBool::new(false);
    let loaded_flag = &loaded;
    let storage = &state.storage;
    let all = state
        .cache
        .compute_if_absent(
            keys::ALL_DEALS,
            state.cache.config().default_ttl_minutes,
            move || async move {
                loaded_flag.store(true, Ordering::Relaxed);
                let mut deals = storage.latest_deals(LISTING_LOAD_LIMIT).await?;
                sort_for_display(&mut deals);
                Ok::<_, hotdeal_db::DbError>(deals)
            },
        )
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let cached = !loaded.load(Ordering::Relaxed);

    let age_minutes = all
        .iter()
        .map(|d| d.crawled_at)
        .max()
        .map(|newest| (Utc::now() - newest).num_minutes().max(0));
    let needs_update = age_minutes.is_none_or(|age| age > STALE_AFTER_MINUTES);

    let searched = match query.q.as_deref() {
        Some(q) => search_deals(&all, q),
        None => all,
    };
    let mut deals = filter_deals(&searched, &filter);
    if let Some(sort) = sort {
        sort_deals(&mut deals, sort);
    }

    let total = deals.len();
    let with_price = deals.iter().filter(|d| d.has_price).count();
    deals.truncate(normalize_limit(query.limit));

    Ok(Json(ApiResponse {
        data: deals,
        meta: DealListMeta {
            base: ResponseMeta::new(req_id.0),
            total,
            with_price,
            age_minutes,
            needs_update,
            cached,
        },
    }))
}

pub(super) async fn get_deal(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DealDetail>>, ApiError> {
    let deal = state
        .storage
        .deal_by_id(&id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", format!("deal {id} not found")))?;

    let time_ago = recency_label(deal.pub_date, Utc::now());
    Ok(Json(ApiResponse {
        data: DealDetail { deal, time_ago },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_price_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<PriceHistoryEntry>>>, ApiError> {
    let data = state
        .storage
        .price_history(&id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn build_filter(query: &DealQuery) -> Result<DealFilter, String> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != "all")
        .map(parse_category)
        .transpose()?;

    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(format!("min_price {min} is greater than max_price {max}"));
        }
    }

    let malls = query
        .mall
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Ok(DealFilter {
        category,
        min_price: query.min_price,
        max_price: query.max_price,
        min_discount: query.min_discount,
        malls,
    })
}

fn parse_category(name: &str) -> Result<Category, String> {
    Category::ALL
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown category '{name}'"))
}
