use axum::{extract::State, Extension, Json};

use crate::collection::CollectionSummary;
use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

/// Triggers a collection run and invalidates every cached listing.
pub(super) async fn update_deals(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CollectionSummary>>, ApiError> {
    let Some(summary) = state.refresh_deals().await else {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            "a collection run is already in progress",
        ));
    };

    Ok(Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    }))
}
