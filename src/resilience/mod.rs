//! The resilient data access layer.
//!
//! All reads and writes to storage go through [`DataAccess`]: queries
//! are bounded by a timeout, failures degrade the tracked connection
//! health and kick off a single background reconnect sequence, and a
//! pair of named TTL caches lets the read paths keep answering during
//! an outage. The write path (the ballot ledger) uses the same timeout
//! handling but never reads from cache.

mod backoff;
mod cache;

pub use backoff::backoff_delay;
pub use cache::{CacheStats, CachedValue, TtlCache};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use mongodb::bson::doc;
use mongodb::Database;
use rocket::tokio::{self, time};

use crate::error::{Error, Result};
use crate::model::api::results::PositionResult;
use crate::model::api::status::ElectionStatus;
use crate::model::mongodb::Id;

/// Connection health as observed by the data access layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    /// No traffic since the last failure; the connection is suspect.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    pub state: ConnectionState,
    /// Reconnect attempts made in the current sequence.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_connected: Option<DateTime<Utc>>,
}

impl ConnectionHealth {
    fn new() -> Self {
        Self {
            state: ConnectionState::Unknown,
            attempts: 0,
            last_error: None,
            last_connected: None,
        }
    }
}

/// Tunables for the data access layer, extracted from the server config.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub query_timeout: Duration,
    pub slow_query_threshold: Duration,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(3),
            slow_query_threshold: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
        }
    }
}

/// The singly-owned data access service, constructed once at startup
/// and injected via managed state. Cheap to clone; clones share the
/// same health, caches and reconnect flag.
#[derive(Clone)]
pub struct DataAccess {
    db: Database,
    config: ResilienceConfig,
    health: Arc<RwLock<ConnectionHealth>>,
    reconnecting: Arc<AtomicBool>,
    status_cache: Arc<TtlCache<ElectionStatus>>,
    results_cache: Arc<TtlCache<Vec<PositionResult>>>,
}

impl DataAccess {
    pub fn new(db: Database, config: ResilienceConfig) -> Self {
        let cache_ttl = config.cache_ttl;
        Self {
            db,
            config,
            health: Arc::new(RwLock::new(ConnectionHealth::new())),
            reconnecting: Arc::new(AtomicBool::new(false)),
            status_cache: Arc::new(TtlCache::new(cache_ttl)),
            results_cache: Arc::new(TtlCache::new(cache_ttl)),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn status_cache(&self) -> &TtlCache<ElectionStatus> {
        &self.status_cache
    }

    pub fn results_cache(&self) -> &TtlCache<Vec<PositionResult>> {
        &self.results_cache
    }

    pub fn health(&self) -> ConnectionHealth {
        self.health.read().expect("health lock poisoned").clone()
    }

    /// Drop any cached tallies for the given election. Called by the
    /// ledger on every accepted ballot: a stale tally crossing a write
    /// is a correctness defect, not a performance one.
    pub fn invalidate_results(&self, election_id: Id) {
        self.results_cache.invalidate(&results_cache_key(election_id));
    }

    /// Run a storage query under the configured timeout.
    ///
    /// Slow queries are logged. Timeouts and errors degrade the health
    /// state and trigger a background reconnect; the caller decides
    /// whether to fall back to cache (reads) or surface a retryable
    /// failure (writes).
    pub async fn run_query<T, F>(&self, name: &str, query: F) -> Result<T>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        let started = Instant::now();
        let outcome = time::timeout(self.config.query_timeout, query).await;
        let elapsed = started.elapsed();
        if elapsed > self.config.slow_query_threshold {
            warn!("Slow query '{name}': {}ms", elapsed.as_millis());
        }
        match outcome {
            Ok(Ok(value)) => {
                self.note_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.note_failure(&format!("query '{name}' failed: {err}"));
                self.trigger_reconnect();
                Err(Error::Db(err))
            }
            Err(_) => {
                self.note_failure(&format!("query '{name}' timed out"));
                self.trigger_reconnect();
                Err(Error::StorageTimeout)
            }
        }
    }

    /// Kick off a background reconnect sequence. Single-flight:
    /// concurrent triggers coalesce into the already-running one.
    pub fn trigger_reconnect(&self) {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let access = self.clone();
        tokio::spawn(async move {
            access.reconnect_loop().await;
        });
    }

    async fn reconnect_loop(&self) {
        let max = self.config.max_reconnect_attempts;
        for attempt in 1..=max {
            {
                let mut health = self.health.write().expect("health lock poisoned");
                health.state = ConnectionState::Connecting;
                health.attempts = attempt;
            }
            let delay = backoff_delay(
                attempt,
                self.config.reconnect_base_delay,
                self.config.reconnect_max_delay,
            );
            info!(
                "Storage reconnect attempt {attempt}/{max} in {}ms",
                delay.as_millis()
            );
            time::sleep(delay).await;

            let ping = self.db.run_command(doc! {"ping": 1}, None);
            match time::timeout(self.config.query_timeout, ping).await {
                Ok(Ok(_)) => {
                    self.note_success();
                    info!("Storage connection re-established after {attempt} attempts");
                    self.reconnecting.store(false, Ordering::SeqCst);
                    return;
                }
                Ok(Err(err)) => {
                    self.note_failure(&format!("reconnect ping failed: {err}"));
                    warn!("Reconnect attempt {attempt}/{max} failed: {err}");
                }
                Err(_) => {
                    self.note_failure("reconnect ping timed out");
                    warn!("Reconnect attempt {attempt}/{max} timed out");
                }
            }
        }

        // Out of retries: stop and make the failure visible rather than
        // retrying forever or silently giving up.
        self.health.write().expect("health lock poisoned").state = ConnectionState::Disconnected;
        self.reconnecting.store(false, Ordering::SeqCst);
        error!("Storage reconnect abandoned after {max} attempts; manual intervention required");
    }

    /// Periodically evict expired cache entries in the background.
    pub fn spawn_cache_sweeper(&self) {
        let access = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(access.config.sweep_interval);
            loop {
                interval.tick().await;
                let evicted = access.status_cache.sweep() + access.results_cache.sweep();
                if evicted > 0 {
                    let status = access.status_cache.stats();
                    let results = access.results_cache.stats();
                    debug!(
                        "Cache sweep evicted {evicted} expired entries \
                         (status {status:?}, results {results:?})"
                    );
                }
            }
        });
    }

    /// Mark the service as going down; called on server shutdown.
    pub fn shutdown(&self) {
        let mut health = self.health.write().expect("health lock poisoned");
        health.state = ConnectionState::Disconnecting;
    }

    fn note_success(&self) {
        let mut health = self.health.write().expect("health lock poisoned");
        health.state = ConnectionState::Connected;
        health.attempts = 0;
        health.last_connected = Some(Utc::now());
    }

    fn note_failure(&self, reason: &str) {
        let mut health = self.health.write().expect("health lock poisoned");
        health.state = ConnectionState::Unknown;
        health.last_error = Some(reason.to_string());
    }
}

pub(crate) fn results_cache_key(election_id: Id) -> String {
    format!("results:{election_id}")
}
