//! In-memory TTL cache for deal listings.
//!
//! Each key maps to a list of records, the time it was stored and its own
//! TTL. An entry is valid while `now <= stored_at + ttl`; expired entries are
//! dropped lazily on read, by an explicit [`TtlCache::cleanup`], or by the
//! background sweep started with [`TtlCache::start`].
//!
//! The cache is a cheap-to-clone handle over shared state, so one instance
//! can be handed to every request handler and to the sweeper task.

pub mod keys;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shortest sweep period accepted by [`TtlCache::start`].
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL used by [`TtlCache::set_default`].
    pub default_ttl_minutes: u32,
    /// Period of the background sweep.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: 10,
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn from_app_config(config: &hotdeal_core::AppConfig) -> Self {
        Self {
            default_ttl_minutes: config.cache_ttl_minutes,
            cleanup_interval: Duration::from_secs(config.cache_cleanup_interval_secs),
        }
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub keys: usize,
    pub total_items: usize,
    pub oldest_update: Option<DateTime<Utc>>,
}

struct Entry<T> {
    data: Vec<T>,
    stored_at: Instant,
    updated_at: DateTime<Utc>,
    ttl_minutes: u32,
}

impl<T> Entry<T> {
    fn is_valid(&self, now: Instant) -> bool {
        now <= self.stored_at + ttl(self.ttl_minutes)
    }
}

fn ttl(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes) * 60)
}

#[derive(Clone)]
pub struct TtlCache<T> {
    config: CacheConfig,
    entries: Arc<Mutex<HashMap<String, Entry<T>>>>,
    /// Bumped by every [`TtlCache::clear`], always while `entries` is locked.
    generation: Arc<AtomicU64>,
}

impl<T> std::fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T> TtlCache<T>
where
    T: Clone + Send + 'static,
{
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Stores `data` under `key`, replacing any previous entry.
    pub async fn set(&self, key: impl Into<String>, data: Vec<T>, ttl_minutes: u32) {
        let key = key.into();
        tracing::debug!(key = %key, items = data.len(), ttl_minutes, "cache set");
        let entry = Entry {
            data,
            stored_at: Instant::now(),
            updated_at: Utc::now(),
            ttl_minutes,
        };
        self.entries.lock().await.insert(key, entry);
    }

    /// [`Self::set`] with the configured default TTL.
    pub async fn set_default(&self, key: impl Into<String>, data: Vec<T>) {
        self.set(key, data, self.config.default_ttl_minutes).await;
    }

    /// Returns a copy of the entry if it is still valid. An expired entry is
    /// evicted and reported as absent.
    pub async fn get(&self, key: &str) -> Option<Vec<T>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(key)?;

        if entry.is_valid(Instant::now()) {
            tracing::trace!(key, items = entry.data.len(), "cache hit");
            return Some(entry.data.clone());
        }

        entries.remove(key);
        tracing::debug!(key, "cache entry expired");
        None
    }

    /// Removes one entry, or every entry when `key` is `None`.
    pub async fn clear(&self, key: Option<&str>) {
        let mut entries = self.entries.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        match key {
            Some(key) => {
                entries.remove(key);
                tracing::debug!(key, "cache entry cleared");
            }
            None => {
                entries.clear();
                tracing::debug!("cache cleared");
            }
        }
    }

    /// Evicts every expired entry and returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(now));
        before - entries.len()
    }

    /// Returns the cached value for `key`, or runs `producer`, caches its
    /// output and returns it.
    ///
    /// The lock is not held while `producer` runs, so two concurrent misses
    /// on the same key may both invoke their producers; the later result
    /// wins. If [`Self::clear`] runs while `producer` is loading, the loaded
    /// value is returned to the caller but not cached.
    ///
    /// # Errors
    ///
    /// Returns the producer's error unchanged. Nothing is cached on failure.
    pub async fn compute_if_absent<F, Fut, E>(
        &self,
        key: &str,
        ttl_minutes: u32,
        producer: F,
    ) -> Result<Vec<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(data) = self.get(key).await {
            return Ok(data);
        }

        tracing::debug!(key, "cache miss, loading");
        let data = producer().await?;

        let mut entries = self.entries.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(key, "cache cleared while loading, result not stored");
            return Ok(data);
        }
        tracing::debug!(key = %key, items = data.len(), ttl_minutes, "cache set");
        entries.insert(
            key.to_string(),
            Entry {
                data: data.clone(),
                stored_at: Instant::now(),
                updated_at: Utc::now(),
                ttl_minutes,
            },
        );
        Ok(data)
    }

    /// Occupancy snapshot. Expired entries that have not been swept yet are
    /// still counted.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            keys: entries.len(),
            total_items: entries.values().map(|e| e.data.len()).sum(),
            oldest_update: entries.values().map(|e| e.updated_at).min(),
        }
    }

    /// Spawns the periodic sweep. The task runs until the returned handle is
    /// stopped or dropped.
    #[must_use = "dropping the handle stops the sweep"]
    pub fn start(&self) -> SweepHandle {
        let cache = self.clone();
        let period = self.config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = cache.cleanup().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "swept expired cache entries");
                }
            }
        });

        tracing::info!(period_secs = period.as_secs(), "cache sweep started");
        SweepHandle { task }
    }
}

/// Owns the background sweep task started by [`TtlCache::start`].
#[derive(Debug)]
pub struct SweepHandle {
    task: JoinHandle<()>,
}

impl SweepHandle {
    pub fn stop(self) {
        self.task.abort();
        tracing::info!("cache sweep stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
