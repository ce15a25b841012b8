//! The election clock: derives the current phase from the two
//! configuration sources and answers status queries through the
//! resilient data access layer.

mod dates;

pub use dates::{normalize_date, parse_time};

use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use mongodb::bson::doc;
use mongodb::options::UpdateOptions;
use mongodb::Database;

use crate::error::Result;
use crate::model::api::status::ElectionStatus;
use crate::model::common::phase::ElectionPhase;
use crate::model::db::election::{Election, ElectionCore};
use crate::model::db::settings::Settings;
use crate::model::mongodb::Coll;
use crate::resilience::DataAccess;

/// Cache entry name for the computed status.
pub const STATUS_CACHE_KEY: &str = "electionStatus";

/// The resolved voting window in UTC.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VotingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolve the voting window from the two configuration sources.
///
/// Precedence, per field: the election's own date and times win, the
/// settings record is the fallback, and missing times default to
/// 08:00-17:00 on the resolved date. Returns `None` only when neither
/// source carries a usable date.
pub fn resolve_window(election: &ElectionCore, settings: Option<&Settings>) -> Option<VotingWindow> {
    let date = election
        .election_date
        .as_deref()
        .and_then(normalize_date)
        .or_else(|| {
            settings
                .and_then(|s| s.voting_date.as_deref())
                .and_then(normalize_date)
        })?;
    let start_time = election
        .start_time
        .as_deref()
        .and_then(parse_time)
        .or_else(|| {
            settings
                .and_then(|s| s.start_time.as_deref())
                .and_then(parse_time)
        })
        .unwrap_or_else(dates::default_start_time);
    let end_time = election
        .end_time
        .as_deref()
        .and_then(parse_time)
        .or_else(|| {
            settings
                .and_then(|s| s.end_time.as_deref())
                .and_then(parse_time)
        })
        .unwrap_or_else(dates::default_end_time);

    Some(VotingWindow {
        start: Utc.from_utc_datetime(&date.and_time(start_time)),
        end: Utc.from_utc_datetime(&date.and_time(end_time)),
    })
}

/// Derive the phase at `now`.
///
/// The manual override always wins over the schedule: explicitly
/// deactivated means not-started even mid-window, explicitly activated
/// means active even outside it (admins may start early or extend).
pub fn phase_at(
    now: DateTime<Utc>,
    election: &ElectionCore,
    settings: Option<&Settings>,
) -> (ElectionPhase, Option<VotingWindow>) {
    let window = resolve_window(election, settings);
    let phase = match election.is_active {
        Some(false) => ElectionPhase::NotStarted,
        Some(true) => ElectionPhase::Active,
        None => match window {
            Some(w) if now < w.start => ElectionPhase::NotStarted,
            Some(w) if now > w.end => ElectionPhase::Ended,
            Some(_) => ElectionPhase::Active,
            None => ElectionPhase::NotStarted,
        },
    };
    (phase, window)
}

/// Pure status computation from already-loaded sources.
pub fn status_from_sources(
    now: DateTime<Utc>,
    election: Option<&ElectionCore>,
    settings: Option<&Settings>,
) -> ElectionStatus {
    match election {
        Some(election) => {
            let (phase, window) = phase_at(now, election, settings);
            ElectionStatus {
                status: phase,
                window_start: window.map(|w| w.start),
                window_end: window.map(|w| w.end),
                results_published: election.results_published,
                stale: false,
            }
        }
        // Without a current election there is no window; the write path
        // surfaces NoActiveElection, the status path stays answerable.
        None => ElectionStatus::fallback(),
    }
}

/// Load the current election and the settings singleton, each bounded
/// by the query timeout.
pub async fn load_status_sources(
    access: &DataAccess,
) -> Result<(Option<Election>, Option<Settings>)> {
    let elections = Coll::<Election>::from_db(access.db());
    let settings = Coll::<Settings>::from_db(access.db());
    let election = access
        .run_query(
            "currentElection",
            elections.find_one(doc! {"is_current": true}, None),
        )
        .await?;
    let settings = access
        .run_query("settings", settings.find_one(doc! {}, None))
        .await?;
    Ok((election, settings))
}

/// Compute the public election status.
///
/// Never fails: a fresh cache hit short-circuits, a storage failure
/// falls back to the last cached value (flagged stale) or to
/// [`ElectionStatus::fallback`].
pub async fn election_status(access: &DataAccess) -> ElectionStatus {
    if let Some(hit) = access.status_cache().get_fresh(STATUS_CACHE_KEY) {
        return hit;
    }
    match load_status_sources(access).await {
        Ok((election, settings)) => {
            let status = status_from_sources(
                Utc::now(),
                election.as_ref().map(|e| &e.election),
                settings.as_ref(),
            );
            access.status_cache().insert(STATUS_CACHE_KEY, status.clone());
            status
        }
        Err(err) => {
            warn!("Status query failed ({err}); serving cached or default status");
            match access.status_cache().get_allow_expired(STATUS_CACHE_KEY) {
                Some(cached) => {
                    let mut status = cached.data;
                    status.stale = cached.stale;
                    status
                }
                None => ElectionStatus::fallback(),
            }
        }
    }
}

/// Best-effort mirror of the status flags into the settings record.
/// A failed mirror write is logged, never fatal.
pub async fn mirror_settings_flags(
    db: &Database,
    is_active: Option<bool>,
    results_published: Option<bool>,
) {
    let mut set = doc! {};
    if let Some(active) = is_active {
        set.insert("is_active", active);
    }
    if let Some(published) = results_published {
        set.insert("results_published", published);
    }
    if set.is_empty() {
        return;
    }
    let settings = Coll::<Settings>::from_db(db);
    let options = UpdateOptions::builder().upsert(true).build();
    if let Err(err) = settings.update_one(doc! {}, doc! {"$set": set}, options).await {
        warn!("Failed to mirror status flags into settings: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn settings_with_window(date: &str, start: &str, end: &str) -> Settings {
        Settings {
            voting_date: Some(date.to_string()),
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            ..Settings::default()
        }
    }

    #[test]
    fn election_fields_win_over_settings() {
        let mut election = ElectionCore::example();
        election.election_date = Some("03/15/2026".to_string());
        election.start_time = Some("09:00".to_string());
        election.end_time = Some("18:00".to_string());
        let settings = settings_with_window("2026-04-01", "10:00", "11:00");

        let window = resolve_window(&election, Some(&settings)).unwrap();
        assert_eq!(window.start, at(2026, 3, 15, 9, 0, 0));
        assert_eq!(window.end, at(2026, 3, 15, 18, 0, 0));
    }

    #[test]
    fn settings_fill_in_missing_election_fields() {
        let mut election = ElectionCore::example();
        election.election_date = None;
        let settings = settings_with_window("2026-04-01", "10:00", "11:00");

        let window = resolve_window(&election, Some(&settings)).unwrap();
        assert_eq!(window.start, at(2026, 4, 1, 10, 0, 0));
        assert_eq!(window.end, at(2026, 4, 1, 11, 0, 0));
    }

    #[test]
    fn missing_times_default_to_business_hours() {
        let election = ElectionCore::example(); // date only, no times
        let window = resolve_window(&election, None).unwrap();
        assert_eq!(window.start, at(2026, 3, 15, 8, 0, 0));
        assert_eq!(window.end, at(2026, 3, 15, 17, 0, 0));
    }

    #[test]
    fn no_date_anywhere_means_no_window() {
        let mut election = ElectionCore::example();
        election.election_date = None;
        assert_eq!(resolve_window(&election, None), None);
        assert_eq!(resolve_window(&election, Some(&Settings::default())), None);
    }

    #[test]
    fn phase_boundaries() {
        let election = ElectionCore::example(); // window 08:00-17:00 on 2026-03-15
        let start = at(2026, 3, 15, 8, 0, 0);
        let end = at(2026, 3, 15, 17, 0, 0);

        let phase = |now| phase_at(now, &election, None).0;
        assert_eq!(phase(start - chrono::Duration::seconds(1)), ElectionPhase::NotStarted);
        assert_eq!(phase(start), ElectionPhase::Active);
        assert_eq!(phase(end), ElectionPhase::Active);
        assert_eq!(phase(end + chrono::Duration::seconds(1)), ElectionPhase::Ended);
    }

    #[test]
    fn manual_deactivation_wins_inside_the_window() {
        let mut election = ElectionCore::example();
        election.is_active = Some(false);
        let mid_window = at(2026, 3, 15, 12, 0, 0);
        assert_eq!(phase_at(mid_window, &election, None).0, ElectionPhase::NotStarted);
    }

    #[test]
    fn manual_activation_wins_outside_the_window() {
        let mut election = ElectionCore::example();
        election.is_active = Some(true);
        let day_after = at(2026, 3, 16, 12, 0, 0);
        assert_eq!(phase_at(day_after, &election, None).0, ElectionPhase::Active);
    }

    #[test]
    fn divergent_formats_produce_one_window() {
        // The election says MM/DD/YYYY, the settings say ISO; both mean
        // the same day, so the election's times apply to it.
        let mut election = ElectionCore::example();
        election.election_date = Some("03/15/2026".to_string());
        let settings = settings_with_window("2026-03-15", "10:00", "11:00");

        let window = resolve_window(&election, Some(&settings)).unwrap();
        assert_eq!(window.start, at(2026, 3, 15, 10, 0, 0));
        assert_eq!(window.end, at(2026, 3, 15, 11, 0, 0));
    }

    #[test]
    fn status_without_current_election_is_the_fallback() {
        let status = status_from_sources(Utc::now(), None, None);
        assert_eq!(status, ElectionStatus::fallback());
    }

    #[rocket::async_test]
    async fn status_survives_a_storage_outage() {
        use crate::resilience::ResilienceConfig;
        use mongodb::Client;
        use rocket::tokio::time;
        use std::time::Duration;

        let config = ResilienceConfig {
            query_timeout: Duration::from_millis(50),
            // Keep the background reconnect quiet and short-lived.
            max_reconnect_attempts: 1,
            reconnect_base_delay: Duration::from_millis(1),
            ..ResilienceConfig::default()
        };
        // TEST-NET address: parses fine, never answers.
        let client = Client::with_uri_str("mongodb://203.0.113.1:27017")
            .await
            .unwrap();
        let access = DataAccess::new(client.database("test"), config);

        // Nothing cached yet: the synthesized default, not an error.
        assert_eq!(election_status(&access).await, ElectionStatus::fallback());

        // With an expired entry present, it is served flagged stale.
        let mut last_known = ElectionStatus::fallback();
        last_known.status = ElectionPhase::Active;
        access
            .status_cache()
            .insert_with_ttl(STATUS_CACHE_KEY, last_known, Duration::from_millis(1));
        time::sleep(Duration::from_millis(20)).await;

        let status = election_status(&access).await;
        assert_eq!(status.status, ElectionPhase::Active);
        assert!(status.stale);
    }

    #[test]
    fn status_carries_window_and_publication_flag() {
        let mut election = ElectionCore::example();
        election.results_published = true;
        let status = status_from_sources(at(2026, 3, 15, 12, 0, 0), Some(&election), None);
        assert_eq!(status.status, ElectionPhase::Active);
        assert_eq!(status.window_start, Some(at(2026, 3, 15, 8, 0, 0)));
        assert_eq!(status.window_end, Some(at(2026, 3, 15, 17, 0, 0)));
        assert!(status.results_published);
        assert!(!status.stale);
    }
}
