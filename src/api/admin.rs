use log::info;
use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::clock;
use crate::error::{Error, Result};
use crate::model::api::status::ElectionStatus;
use crate::model::db::election::Election;
use crate::model::mongodb::{Coll, Id};
use crate::resilience::DataAccess;

pub fn routes() -> Vec<Route> {
    routes![toggle_election_active, set_publication, set_current_election]
}

/// Flip the manual voting override on the current election.
///
/// Turning it on opens voting immediately, even outside the scheduled
/// window; turning it off closes voting and resets the status to
/// not-started. The settings mirror is updated best-effort.
#[post("/admin/election/active/toggle")]
async fn toggle_election_active(access: &State<DataAccess>) -> Result<Json<ElectionStatus>> {
    let db = access.db();
    let elections = Coll::<Election>::from_db(db);
    let election = access
        .run_query(
            "admin.currentElection",
            elections.find_one(doc! {"is_current": true}, None),
        )
        .await?
        .ok_or(Error::NoActiveElection)?;

    let new_active = election.is_active != Some(true);
    access
        .run_query(
            "admin.toggleActive",
            elections.update_one(
                doc! {"_id": *election.id},
                doc! {"$set": {"is_active": new_active}},
                None,
            ),
        )
        .await?;
    clock::mirror_settings_flags(db, Some(new_active), None).await;
    access.status_cache().invalidate(clock::STATUS_CACHE_KEY);
    info!(
        "Election '{}' manually {}",
        election.title,
        if new_active { "activated" } else { "deactivated" }
    );

    Ok(Json(clock::election_status(access.inner()).await))
}

/// Gate whether collaborators may show results to voters. The tally
/// engine itself always computes on demand for admin preview.
#[post("/admin/election/publish", data = "<published>", format = "json")]
async fn set_publication(
    published: Json<bool>,
    access: &State<DataAccess>,
) -> Result<Json<ElectionStatus>> {
    let db = access.db();
    let elections = Coll::<Election>::from_db(db);
    let result = access
        .run_query(
            "admin.setPublication",
            elections.update_one(
                doc! {"is_current": true},
                doc! {"$set": {"results_published": published.0}},
                None,
            ),
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::NoActiveElection);
    }
    clock::mirror_settings_flags(db, None, Some(published.0)).await;
    access.status_cache().invalidate(clock::STATUS_CACHE_KEY);
    info!(
        "Results {} for the current election",
        if published.0 { "published" } else { "unpublished" }
    );

    Ok(Json(clock::election_status(access.inner()).await))
}

/// Select which election is current. The partial unique index on
/// `is_current` never sees two at once because the old one is cleared
/// first.
#[post("/admin/elections/<election_id>/current")]
async fn set_current_election(election_id: Id, access: &State<DataAccess>) -> Result<()> {
    let db = access.db();
    let elections = Coll::<Election>::from_db(db);
    access
        .run_query(
            "admin.clearCurrent",
            elections.update_many(
                doc! {"is_current": true},
                doc! {"$set": {"is_current": false}},
                None,
            ),
        )
        .await?;
    let result = access
        .run_query(
            "admin.setCurrent",
            elections.update_one(
                doc! {"_id": *election_id},
                doc! {"$set": {"is_current": true}},
                None,
            ),
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("No election with ID {election_id}")));
    }
    access.status_cache().invalidate(clock::STATUS_CACHE_KEY);
    info!("Election {election_id} is now current");
    Ok(())
}
