use crate::app_config::{AppConfig, Environment, StorageBackend};
use crate::ConfigError;

/// Upper bound for `HOTDEAL_RETENTION_DAYS`.
const MAX_RETENTION_DAYS: u32 = 3650;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("HOTDEAL_ENV", "development"))?;
    let storage = parse_storage_backend(&or_default("HOTDEAL_STORAGE", "json"))?;

    let database_url = lookup("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
    if storage == StorageBackend::Postgres && database_url.is_none() {
        return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
    }

    let data_dir = PathBuf::from(or_default("HOTDEAL_DATA_DIR", "./data-local"));

    let bind_addr = or_default("HOTDEAL_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("HOTDEAL_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("HOTDEAL_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("HOTDEAL_SOURCES_PATH", "./config/sources.yaml"));

    let db_max_connections = parse_u32("HOTDEAL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("HOTDEAL_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("HOTDEAL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("HOTDEAL_SCRAPER_REQUEST_TIMEOUT_SECS", "10")?;
    let scraper_user_agent = or_default("HOTDEAL_SCRAPER_USER_AGENT", "hotdeal/0.1 (+rss-collector)");
    let scraper_max_retries = parse_u32("HOTDEAL_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("HOTDEAL_SCRAPER_RETRY_BACKOFF_BASE_SECS", "1")?;
    let max_items_per_source = parse_usize("HOTDEAL_MAX_ITEMS_PER_SOURCE", "15")?;

    let cache_ttl_minutes = parse_u32("HOTDEAL_CACHE_TTL_MINUTES", "10")?;
    if cache_ttl_minutes == 0 {
        return Err(invalid(
            "HOTDEAL_CACHE_TTL_MINUTES",
            "must be greater than zero".to_string(),
        ));
    }
    let cache_cleanup_interval_secs = parse_u64("HOTDEAL_CACHE_CLEANUP_INTERVAL_SECS", "300")?;
    if cache_cleanup_interval_secs == 0 {
        return Err(invalid(
            "HOTDEAL_CACHE_CLEANUP_INTERVAL_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let collect_cron = or_default("HOTDEAL_COLLECT_CRON", "0 */10 * * * *");
    let retention_days = parse_u32("HOTDEAL_RETENTION_DAYS", "30")?;
    if !(1..=MAX_RETENTION_DAYS).contains(&retention_days) {
        return Err(invalid(
            "HOTDEAL_RETENTION_DAYS",
            format!("must be between 1 and {MAX_RETENTION_DAYS}"),
        ));
    }

    Ok(AppConfig {
        env,
        storage,
        database_url,
        data_dir,
        bind_addr,
        log_level,
        sources_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        max_items_per_source,
        cache_ttl_minutes,
        cache_cleanup_interval_secs,
        collect_cron,
        retention_days,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "HOTDEAL_ENV".to_string(),
            reason: format!("expected development, test or production; got '{other}'"),
        }),
    }
}

fn parse_storage_backend(s: &str) -> Result<StorageBackend, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "json" | "file" => Ok(StorageBackend::Json),
        "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
        other => Err(ConfigError::InvalidEnvVar {
            var: "HOTDEAL_STORAGE".to_string(),
            reason: format!("expected json or postgres; got '{other}'"),
        }),
    }
}
