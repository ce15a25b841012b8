use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::clock;
use crate::error::{Error, Result};
use crate::model::api::results::{ParticipationStats, PositionResult};
use crate::model::api::status::ElectionStatus;
use crate::model::db::election::Election;
use crate::model::mongodb::{Coll, Id};
use crate::resilience::DataAccess;
use crate::tally;

pub fn routes() -> Vec<Route> {
    routes![
        election_status,
        current_results,
        election_results,
        current_participation,
        election_participation,
    ]
}

/// The status endpoint never fails: storage outages are absorbed by the
/// clock's cache fallback, because the whole voting UI polls this.
#[get("/election/status")]
async fn election_status(access: &State<DataAccess>) -> Json<ElectionStatus> {
    Json(clock::election_status(access.inner()).await)
}

#[get("/results")]
async fn current_results(access: &State<DataAccess>) -> Result<Json<Vec<PositionResult>>> {
    let election_id = current_election_id(access.inner()).await?;
    Ok(Json(tally::compute_results(access.inner(), election_id).await?))
}

#[get("/elections/<election_id>/results")]
async fn election_results(
    election_id: Id,
    access: &State<DataAccess>,
) -> Result<Json<Vec<PositionResult>>> {
    Ok(Json(tally::compute_results(access.inner(), election_id).await?))
}

#[get("/participation")]
async fn current_participation(access: &State<DataAccess>) -> Result<Json<ParticipationStats>> {
    let election_id = current_election_id(access.inner()).await?;
    Ok(Json(tally::participation(access.inner(), election_id).await?))
}

#[get("/elections/<election_id>/participation")]
async fn election_participation(
    election_id: Id,
    access: &State<DataAccess>,
) -> Result<Json<ParticipationStats>> {
    Ok(Json(tally::participation(access.inner(), election_id).await?))
}

/// Look up the ID of the current election.
async fn current_election_id(access: &DataAccess) -> Result<Id> {
    let elections = Coll::<Election>::from_db(access.db());
    let election = access
        .run_query(
            "currentElection",
            elections.find_one(doc! {"is_current": true}, None),
        )
        .await?
        .ok_or(Error::NoActiveElection)?;
    Ok(election.id)
}
