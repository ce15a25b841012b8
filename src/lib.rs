#[macro_use]
extern crate rocket;

use rocket::{fairing::AdHoc, Build, Rocket};

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod resilience;
pub mod tally;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use resilience::DataAccess;

/// Assemble the rocket: routes, config, database connection and the
/// background tasks of the data access layer. Does not launch.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
        .attach(AdHoc::on_liftoff("Cache sweeper", |rocket| {
            Box::pin(async move {
                if let Some(access) = rocket.state::<DataAccess>() {
                    access.spawn_cache_sweeper();
                }
            })
        }))
        .attach(AdHoc::on_shutdown("Data access teardown", |rocket| {
            Box::pin(async move {
                if let Some(access) = rocket.state::<DataAccess>() {
                    access.shutdown();
                }
            })
        }))
}
