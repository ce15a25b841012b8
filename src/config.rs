use std::time::Duration;

use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;
use crate::resilience::{DataAccess, ResilienceConfig};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    query_timeout_ms: u64,
    slow_query_ms: u64,
    cache_ttl_secs: u64,
    cache_sweep_secs: u64,
    reconnect_base_ms: u64,
    reconnect_max_ms: u64,
    max_reconnect_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_timeout_ms: 3000,
            slow_query_ms: 1000,
            cache_ttl_secs: 5,
            cache_sweep_secs: 30,
            reconnect_base_ms: 500,
            reconnect_max_ms: 30_000,
            max_reconnect_attempts: 10,
        }
    }
}

impl Config {
    /// Upper bound on any single storage query.
    /// Configured via `QUERY_TIMEOUT_MS`.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Queries slower than this are logged.
    /// Configured via `SLOW_QUERY_MS`.
    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_ms)
    }

    /// How long cached status and tally entries stay fresh.
    /// Configured via `CACHE_TTL_SECS`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Interval between background cache sweeps.
    /// Configured via `CACHE_SWEEP_SECS`.
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs)
    }

    /// The tunables consumed by the data access layer.
    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig {
            query_timeout: self.query_timeout(),
            slow_query_threshold: self.slow_query_threshold(),
            cache_ttl: self.cache_ttl(),
            sweep_interval: self.cache_sweep_interval(),
            reconnect_base_delay: Duration::from_millis(self.reconnect_base_ms),
            reconnect_max_delay: Duration::from_millis(self.reconnect_max_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places a `Client`, a `Database`
/// and the [`DataAccess`] service into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // The application config fairing runs first, so the tunables are
        // already in managed state.
        let resilience = rocket
            .state::<Config>()
            .map(Config::resilience)
            .unwrap_or_default();
        let access = DataAccess::new(db.clone(), resilience);

        // Manage the state.
        rocket = rocket.manage(client).manage(db).manage(access);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "ballotbox".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
