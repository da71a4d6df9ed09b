pub mod app_config;
pub mod config;
pub mod deals;
pub mod search;
pub mod sources;

pub use app_config::{AppConfig, Environment, StorageBackend};
pub use config::{load_app_config, load_app_config_from_env};
pub use deals::{
    days_before, format_won, hours_before, Category, CollectionOutcome, CrawlLog, CrawlStats, Deal,
    FeedItem, PriceHistoryEntry, PriceInfo, DELIVERY_FREE, DELIVERY_PAID, DELIVERY_UNKNOWN,
    NO_PRICE_TEXT,
};
pub use search::{filter_deals, search_deals, sort_deals, DealFilter, SortBy};
pub use sources::{load_sources, SourceConfig, SourcesFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("invalid sources config: {0}")]
    Validation(String),
}
