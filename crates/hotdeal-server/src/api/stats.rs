use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use hotdeal_core::CrawlStats;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const DEFAULT_STATS_HOURS: i64 = 24;
const MAX_STATS_HOURS: i64 = 24 * 30;

#[derive(Debug, Deserialize)]
pub(super) struct StatsQuery {
    pub hours: Option<i64>,
}

pub(super) async fn crawl_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<Vec<CrawlStats>>>, ApiError> {
    let hours = query
        .hours
        .unwrap_or(DEFAULT_STATS_HOURS)
        .clamp(1, MAX_STATS_HOURS);
    let since = Utc::now() - Duration::hours(hours);

    let data = state
        .storage
        .crawl_stats(since)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
