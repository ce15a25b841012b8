//! The ballot ledger: append-only, idempotent persistence of one vote
//! per (voter, election, position), including explicit abstentions.
//!
//! Every check here reads storage directly; the duplicate-vote decision
//! is never made from cache. The unique index over
//! (voter_id, election_id, position_id) is the serialization point for
//! concurrent submissions, so two requests racing the `has_voted` check
//! cannot both land their rows.

use chrono::Utc;
use log::{error, info};
use mongodb::bson::{self, doc};
use mongodb::options::FindOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;

use crate::clock;
use crate::error::{Error, Result};
use crate::model::api::ballot::{BallotReceipt, BallotSpec, SelectionSpec};
use crate::model::common::phase::ElectionPhase;
use crate::model::db::candidate::Candidate;
use crate::model::db::election::Election;
use crate::model::db::position::Position;
use crate::model::db::settings::Settings;
use crate::model::db::vote::{NewVote, Vote, VoteCore};
use crate::model::db::voter::Voter;
use crate::model::mongodb::{Coll, Id};
use crate::resilience::DataAccess;

/// Validate a ballot set against the election's active positions.
///
/// Every position needs exactly one entry: a candidate standing for
/// that position, or an explicit abstention. Returns the vote rows to
/// insert, in position order, all tagged with the submission ID.
pub fn validate_selections(
    voter_id: Id,
    election_id: Id,
    submission_id: Id,
    positions: &[Position],
    candidates: &[Candidate],
    selections: &[SelectionSpec],
) -> Result<Vec<NewVote>> {
    // Reject unknown positions and duplicate entries up front.
    for selection in selections {
        if !positions.iter().any(|p| p.id == selection.position_id) {
            return Err(Error::InvalidSelection(format!(
                "unknown or inactive position {}",
                selection.position_id
            )));
        }
        let entries = selections
            .iter()
            .filter(|s| s.position_id == selection.position_id)
            .count();
        if entries > 1 {
            return Err(Error::InvalidSelection(format!(
                "multiple entries for position {}",
                selection.position_id
            )));
        }
    }

    let mut votes = Vec::with_capacity(positions.len());
    for position in positions {
        let selection = selections
            .iter()
            .find(|s| s.position_id == position.id)
            .ok_or_else(|| Error::IncompleteBallot(position.title.clone()))?;
        let vote = match (selection.candidate_id, selection.abstain) {
            (Some(candidate_id), false) => {
                let stands_here = candidates.iter().any(|c| {
                    c.id == candidate_id
                        && c.position_id == position.id
                        && c.election_id == election_id
                });
                if !stands_here {
                    return Err(Error::InvalidSelection(format!(
                        "candidate {} does not stand for position '{}'",
                        candidate_id, position.title
                    )));
                }
                VoteCore::for_candidate(
                    voter_id,
                    election_id,
                    position.id,
                    candidate_id,
                    submission_id,
                )
            }
            (None, true) => {
                VoteCore::abstention(voter_id, election_id, position.id, submission_id)
            }
            (Some(_), true) => {
                return Err(Error::InvalidSelection(
                    "a selection cannot both name a candidate and abstain".to_string(),
                ))
            }
            (None, false) => {
                return Err(Error::InvalidSelection(format!(
                    "no candidate or abstention for position '{}'",
                    position.title
                )))
            }
        };
        votes.push(vote);
    }
    Ok(votes)
}

/// Accept a complete ballot set for one voter. All-or-nothing: on any
/// failure the pre-submission state is restored, with `has_voted` still
/// false and no vote rows retained.
pub async fn cast_ballot(access: &DataAccess, spec: &BallotSpec) -> Result<BallotReceipt> {
    let db = access.db();

    // The election must exist, be current, and be in its active phase.
    let elections = Coll::<Election>::from_db(db);
    let election = access
        .run_query(
            "castBallot.election",
            elections.find_one(doc! {"is_current": true}, None),
        )
        .await?
        .ok_or(Error::NoActiveElection)?;
    let settings = access
        .run_query(
            "castBallot.settings",
            Coll::<Settings>::from_db(db).find_one(doc! {}, None),
        )
        .await?;
    let (phase, _) = clock::phase_at(Utc::now(), &election, settings.as_ref());
    if phase != ElectionPhase::Active {
        return Err(Error::ElectionNotActive);
    }

    // Fresh authoritative read of the voter; a client racing the status
    // check still gets stopped by the atomic claim below.
    let voters = Coll::<Voter>::from_db(db);
    let voter = access
        .run_query(
            "castBallot.voter",
            voters.find_one(
                doc! {"_id": *spec.voter_id, "election_id": *election.id},
                None,
            ),
        )
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("No voter {} in the current election", spec.voter_id))
        })?;
    if voter.has_voted {
        return Err(Error::AlreadyVoted);
    }

    let position_order = FindOptions::builder().sort(doc! {"priority": 1}).build();
    let positions: Vec<Position> = access
        .run_query("castBallot.positions", async {
            Coll::<Position>::from_db(db)
                .find(
                    doc! {"election_id": *election.id, "is_active": true},
                    position_order,
                )
                .await?
                .try_collect()
                .await
        })
        .await?;
    let candidates: Vec<Candidate> = access
        .run_query("castBallot.candidates", async {
            Coll::<Candidate>::from_db(db)
                .find(doc! {"election_id": *election.id}, None)
                .await?
                .try_collect()
                .await
        })
        .await?;

    let submission_id = Id::new();
    let votes = validate_selections(
        voter.id,
        election.id,
        submission_id,
        &positions,
        &candidates,
        &spec.selections,
    )?;

    // Insert the rows individually. Bulk operation support isn't in
    // rust-mongodb yet, so we have to do them one at a time anyway.
    // Every row carries the submission ID, so compensation can find
    // them all, including an insert that timed out client-side but
    // still landed server-side.
    let votes_coll = Coll::<NewVote>::from_db(db);
    for vote in &votes {
        let result = access
            .run_query("castBallot.insert", votes_coll.insert_one(vote, None))
            .await;
        if let Err(err) = result {
            rollback_votes(db, spec.voter_id, election.id, submission_id).await;
            return Err(match err {
                Error::Db(ref db_err) if Error::is_duplicate_key(db_err) => Error::AlreadyVoted,
                other => other,
            });
        }
    }

    // Claim the voter. The filter closes the race between the check
    // above and this write: a concurrent submission that already won
    // matches nothing here.
    let voted_at = Utc::now();
    let claim = access
        .run_query(
            "castBallot.claim",
            voters.update_one(
                doc! {"_id": *spec.voter_id, "has_voted": false},
                doc! {"$set": {
                    "has_voted": true,
                    "voted_at": bson::DateTime::from_chrono(voted_at),
                }},
                None,
            ),
        )
        .await;
    match claim {
        Ok(result) if result.matched_count == 1 => {}
        Ok(_) => {
            rollback_votes(db, spec.voter_id, election.id, submission_id).await;
            return Err(Error::AlreadyVoted);
        }
        Err(err) => {
            rollback_votes(db, spec.voter_id, election.id, submission_id).await;
            return Err(err);
        }
    }

    // Stale tallies must not survive an accepted ballot.
    access.invalidate_results(election.id);

    info!(
        "Accepted ballot set from voter {} ({} votes)",
        spec.voter_id,
        votes.len()
    );
    Ok(BallotReceipt {
        accepted: true,
        votes_recorded: votes.len(),
        voted_at,
    })
}

/// Compensating deletion: remove every row of this submission,
/// restoring the pre-submission state. Scoped by submission ID so a
/// concurrent winner's rows are never touched, while rows this
/// submission landed without observing (a client-side timeout) are.
async fn rollback_votes(db: &Database, voter_id: Id, election_id: Id, submission_id: Id) {
    let votes = Coll::<Vote>::from_db(db);
    if let Err(err) = votes
        .delete_many(
            doc! {
                "voter_id": *voter_id,
                "election_id": *election_id,
                "submission_id": *submission_id,
            },
            None,
        )
        .await
    {
        error!("Failed to roll back partial ballot for voter {voter_id}: {err}");
    }
}
