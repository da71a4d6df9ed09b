mod collect;
mod query;

use clap::{Parser, Subcommand};
use hotdeal_core::AppConfig;
use hotdeal_db::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hotdeal-cli")]
#[command(about = "Hot-deal collector command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every enabled feed and store the normalized deals
    Collect {
        /// Restrict collection to one source (by name)
        #[arg(long)]
        source: Option<String>,

        /// Print what would be stored without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored deals
    Deals {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Search title, mall name and category aliases
        #[arg(short, long)]
        q: Option<String>,

        /// Restrict to one category (tech, fashion, food, living, health, gaming, general)
        #[arg(long)]
        category: Option<String>,

        /// latest, price_low, price_high or discount
        #[arg(long)]
        sort: Option<String>,
    },
    /// Run the price extractor on a single title
    Extract {
        title: String,

        /// Source name passed to the extractor for logging
        #[arg(long, default_value = "cli")]
        source: String,
    },
    /// Show recorded prices for one deal
    History {
        id: String,

        #[arg(long, default_value_t = 30)]
        limit: usize,
    },
    /// Per-source crawl statistics
    Stats {
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Delete price history and crawl logs older than the retention window
    Cleanup {
        /// Overrides `HOTDEAL_RETENTION_DAYS`
        #[arg(long)]
        days: Option<u32>,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = hotdeal_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Collect { source, dry_run }) => {
            collect::run_collect(&config, source.as_deref(), dry_run).await?;
        }
        Some(Commands::Deals {
            limit,
            q,
            category,
            sort,
        }) => {
            let storage = connect(&config).await?;
            query::run_deals(&storage, limit, q.as_deref(), category.as_deref(), sort.as_deref())
                .await?;
        }
        Some(Commands::Extract { title, source }) => query::run_extract(&title, &source)?,
        Some(Commands::History { id, limit }) => {
            let storage = connect(&config).await?;
            query::run_history(&storage, &id, limit).await?;
        }
        Some(Commands::Stats { hours }) => {
            let storage = connect(&config).await?;
            query::run_stats(&storage, hours).await?;
        }
        Some(Commands::Cleanup { days }) => {
            let storage = connect(&config).await?;
            query::run_cleanup(&storage, days.unwrap_or(config.retention_days)).await?;
        }
        Some(Commands::Migrate) => {
            let storage = connect(&config).await?;
            let applied = storage.migrate().await?;
            println!("{} backend: applied {applied} migration(s)", storage.backend());
        }
        None => println!("hotdeal-cli: no command given; see --help"),
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<Storage> {
    let storage = Storage::connect(config).await?;
    tracing::debug!(backend = %storage.backend(), "storage connected");
    Ok(storage)
}
