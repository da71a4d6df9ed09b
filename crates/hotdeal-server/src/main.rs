mod api;
mod collection;
mod middleware;
mod scheduler;

use std::sync::Arc;

use hotdeal_cache::{CacheConfig, TtlCache};
use hotdeal_db::Storage;
use hotdeal_scraper::FeedClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(hotdeal_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let storage = Storage::connect(&config).await?;
    let applied = storage.migrate().await?;
    tracing::info!(backend = %storage.backend(), applied, "storage ready");

    let sources = hotdeal_core::load_sources(&config.sources_path)?.enabled(None);
    tracing::info!(count = sources.len(), "loaded feed sources");

    let feeds = FeedClient::new(
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
        config.scraper_max_retries,
        config.scraper_retry_backoff_base_secs,
    )?;

    let cache = TtlCache::new(CacheConfig::from_app_config(&config));
    let _sweep = cache.start();

    let state = AppState::new(storage, cache, feeds, sources, Arc::clone(&config));
    let _scheduler = scheduler::build_scheduler(state.clone()).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        hotdeal_core::Environment::Development
    ))?;
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
