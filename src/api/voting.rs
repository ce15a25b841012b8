use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::ledger;
use crate::model::api::ballot::{BallotReceipt, BallotSpec};
use crate::resilience::DataAccess;

pub fn routes() -> Vec<Route> {
    routes![cast_ballot]
}

/// Accept a complete ballot set. On storage trouble the voter gets a
/// retryable 503, never a false acceptance.
#[post("/ballots", data = "<ballot>", format = "json")]
async fn cast_ballot(
    ballot: Json<BallotSpec>,
    access: &State<DataAccess>,
) -> Result<Json<BallotReceipt>> {
    let receipt = ledger::cast_ballot(access.inner(), &ballot).await?;
    Ok(Json(receipt))
}
