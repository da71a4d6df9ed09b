use std::time::Duration;

use hotdeal_core::FeedItem;
use reqwest::Client;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// HTTP client for RSS/Atom deal feeds.
///
/// 404 and other non-2xx statuses surface as typed errors. Transient errors
/// (429, network failures) are retried with exponential backoff up to
/// `max_retries` additional attempts.
pub struct FeedClient {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl FeedClient {
    /// Creates a client with the configured timeout, `User-Agent` and retry
    /// policy. `max_retries = 0` disables retries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches a feed and returns its items in feed order.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`]: HTTP 429 after all retries.
    /// - [`ScraperError::NotFound`]: HTTP 404 (not retried).
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Http`]: network failure after all retries.
    /// - [`ScraperError::Feed`]: the body is not a parseable RSS/Atom feed.
    pub async fn fetch_items(&self, url: &str) -> Result<Vec<FeedItem>, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(0);
                return Err(ScraperError::RateLimited {
                    url: url.to_owned(),
                    retry_after_secs,
                });
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScraperError::NotFound {
                    url: url.to_owned(),
                });
            }

            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            let body = response.bytes().await?;
            parse_feed(&body, url)
        })
        .await
    }
}

/// Parses an RSS 2.0 or Atom document into raw feed items.
///
/// Dates are re-rendered as RFC 3339; the summary wins over the full
/// content body for the description.
///
/// # Errors
///
/// Returns [`ScraperError::Feed`] if the document is not a recognisable feed.
pub fn parse_feed(body: &[u8], url: &str) -> Result<Vec<FeedItem>, ScraperError> {
    let feed = feed_rs::parser::parse(body).map_err(|source| ScraperError::Feed {
        url: url.to_owned(),
        source,
    })?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| FeedItem {
            title: entry.title.map(|t| t.content),
            link: entry.links.into_iter().next().map(|l| l.href),
            pub_date: entry.published.or(entry.updated).map(|dt| dt.to_rfc3339()),
            description: entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body)),
        })
        .collect())
}
