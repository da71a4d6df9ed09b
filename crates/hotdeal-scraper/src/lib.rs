pub mod collect;
pub mod error;
pub mod extract;
pub mod feed;
pub mod normalize;
mod rate_limit;

pub use collect::{build_deals, collect_all, collect_source};
pub use error::ScraperError;
pub use extract::{extract_price_info, PriceTier};
pub use feed::{parse_feed, FeedClient};
pub use normalize::{
    build_tags, categorize, deal_id, normalize_deal, parse_pub_date, sort_for_display, time_ago,
};
