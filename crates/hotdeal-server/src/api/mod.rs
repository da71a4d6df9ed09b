mod deals;
mod stats;
mod update;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use hotdeal_cache::{CacheStats, TtlCache};
use hotdeal_core::{AppConfig, Deal, SourceConfig};
use hotdeal_db::Storage;
use hotdeal_scraper::FeedClient;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::collection::{run_collection, CollectionSummary};
use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub cache: TtlCache<Deal>,
    pub feeds: Arc<FeedClient>,
    pub sources: Arc<Vec<SourceConfig>>,
    pub config: Arc<AppConfig>,
    /// Held for the duration of a collection run.
    pub collect_lock: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        storage: Storage,
        cache: TtlCache<Deal>,
        feeds: FeedClient,
        sources: Vec<SourceConfig>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            storage,
            cache,
            feeds: Arc::new(feeds),
            sources: Arc::new(sources),
            config,
            collect_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Runs a collection over every configured source and drops all cached
    /// listings. Returns `None` without doing anything if another run holds
    /// the collection lock.
    pub async fn refresh_deals(&self) -> Option<CollectionSummary> {
        let Ok(_guard) = self.collect_lock.try_lock() else {
            tracing::info!("collection already running; skipping");
            return None;
        };

        let summary = run_collection(
            &self.storage,
            &self.feeds,
            &self.sources,
            self.config.max_items_per_source,
        )
        .await;
        self.cache.clear(None).await;
        Some(summary)
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize, M: Serialize = ResponseMeta> {
    pub data: T,
    pub meta: M,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    storage: &'static str,
    backend: String,
    sources: usize,
    cache: CacheStats,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> usize {
    usize::try_from(limit.unwrap_or(50).clamp(1, 200)).unwrap_or(50)
}

pub(super) fn map_db_error(request_id: String, error: &hotdeal_db::DbError) -> ApiError {
    tracing::error!(error = %error, "storage query failed");
    ApiError::new(request_id, "internal_error", "storage query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn read_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/deals", get(deals::list_deals))
        .route("/api/deals/{id}", get(deals::get_deal))
        .route("/api/price-history/{id}", get(deals::list_price_history))
        .route("/api/crawl-stats", get(stats::crawl_stats))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/update-deals", post(update::update_deals))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(read_router(rate_limit.clone()))
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let cache = state.cache.stats().await;
    let backend = state.storage.backend().to_string();
    let sources = state.sources.len();

    match state.storage.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    storage: "ok",
                    backend,
                    sources,
                    cache,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        storage: "unavailable",
                        backend,
                        sources,
                        cache,
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
