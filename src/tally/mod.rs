//! The tally engine: derives per-position results and participation
//! statistics from the vote ledger. Tallies are always computed from
//! the rows; nothing here is stored back.

use mongodb::bson::doc;
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::api::results::{CandidateTally, ParticipationStats, PositionResult};
use crate::model::db::candidate::Candidate;
use crate::model::db::position::Position;
use crate::model::db::vote::Vote;
use crate::model::db::voter::Voter;
use crate::model::mongodb::{Coll, Id};
use crate::resilience::{results_cache_key, DataAccess};

/// Pure tabulation over already-loaded rows.
///
/// Positions are ordered by priority ascending. Per candidate, the
/// percentage is the share of the position's non-abstention votes,
/// rounded to one decimal place; candidates sort by vote count
/// descending with ties keeping their input order. Abstentions count
/// toward `total_votes` but toward no candidate.
pub fn tabulate(
    positions: &[Position],
    candidates: &[Candidate],
    votes: &[Vote],
) -> Vec<PositionResult> {
    let mut ordered: Vec<&Position> = positions.iter().filter(|p| p.is_active).collect();
    ordered.sort_by_key(|p| p.priority);

    ordered
        .into_iter()
        .map(|position| {
            let position_votes: Vec<&Vote> = votes
                .iter()
                .filter(|v| v.position_id == position.id)
                .collect();
            let total_votes = position_votes.len() as u64;
            let abstentions = position_votes.iter().filter(|v| v.is_abstention).count() as u64;
            let counted = total_votes - abstentions;

            let mut tallies: Vec<CandidateTally> = candidates
                .iter()
                .filter(|c| c.position_id == position.id)
                .map(|candidate| {
                    let vote_count = position_votes
                        .iter()
                        .filter(|v| v.candidate_id == Some(candidate.id))
                        .count() as u64;
                    CandidateTally {
                        candidate_id: candidate.id,
                        name: candidate.name.clone(),
                        vote_count,
                        percentage: percentage(vote_count, counted),
                    }
                })
                .collect();
            // Stable sort: ties keep their input order.
            tallies.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

            PositionResult {
                position_id: position.id,
                title: position.title.clone(),
                candidates: tallies,
                total_votes,
                abstentions,
            }
        })
        .collect()
}

fn percentage(count: u64, counted_total: u64) -> f64 {
    if counted_total == 0 {
        return 0.0;
    }
    (count as f64 / counted_total as f64 * 1000.0).round() / 10.0
}

/// Compute the results for an election.
///
/// Served from cache when fresh; the ledger invalidates the entry on
/// every accepted ballot, so a tally can never cross a write.
pub async fn compute_results(access: &DataAccess, election_id: Id) -> Result<Vec<PositionResult>> {
    let key = results_cache_key(election_id);
    if let Some(hit) = access.results_cache().get_fresh(&key) {
        return Ok(hit);
    }

    let db = access.db();
    let positions: Vec<Position> = access
        .run_query("results.positions", async {
            Coll::<Position>::from_db(db)
                .find(doc! {"election_id": *election_id}, None)
                .await?
                .try_collect()
                .await
        })
        .await?;
    let candidates: Vec<Candidate> = access
        .run_query("results.candidates", async {
            Coll::<Candidate>::from_db(db)
                .find(doc! {"election_id": *election_id}, None)
                .await?
                .try_collect()
                .await
        })
        .await?;
    let votes: Vec<Vote> = access
        .run_query("results.votes", async {
            Coll::<Vote>::from_db(db)
                .find(doc! {"election_id": *election_id}, None)
                .await?
                .try_collect()
                .await
        })
        .await?;

    let results = tabulate(&positions, &candidates, &votes);
    access.results_cache().insert(&key, results.clone());
    Ok(results)
}

/// Voter participation for an election.
pub async fn participation(access: &DataAccess, election_id: Id) -> Result<ParticipationStats> {
    let voters = Coll::<Voter>::from_db(access.db());
    let total = access
        .run_query(
            "participation.total",
            voters.count_documents(doc! {"election_id": *election_id}, None),
        )
        .await?;
    let voted = access
        .run_query(
            "participation.voted",
            voters.count_documents(doc! {"election_id": *election_id, "has_voted": true}, None),
        )
        .await?;
    Ok(ParticipationStats::new(total, voted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::db::candidate::CandidateCore;
    use crate::model::db::position::PositionCore;
    use crate::model::db::vote::VoteCore;

    fn position(election_id: Id, title: &str, priority: i32) -> Position {
        Position {
            id: Id::new(),
            position: PositionCore {
                election_id,
                title: title.to_string(),
                priority,
                max_candidates: 1,
                max_selections: 1,
                is_active: true,
            },
        }
    }

    fn candidate(election_id: Id, position_id: Id, name: &str) -> Candidate {
        Candidate {
            id: Id::new(),
            candidate: CandidateCore {
                election_id,
                position_id,
                name: name.to_string(),
                photo_url: None,
            },
        }
    }

    fn vote_for(election_id: Id, position_id: Id, candidate_id: Id) -> Vote {
        Vote {
            id: Id::new(),
            vote: VoteCore::for_candidate(
                Id::new(),
                election_id,
                position_id,
                candidate_id,
                Id::new(),
            ),
        }
    }

    fn abstention(election_id: Id, position_id: Id) -> Vote {
        Vote {
            id: Id::new(),
            vote: VoteCore::abstention(Id::new(), election_id, position_id, Id::new()),
        }
    }

    #[test]
    fn three_to_two_split() {
        let election_id = Id::new();
        let pos = position(election_id, "President", 1);
        let a = candidate(election_id, pos.id, "A");
        let b = candidate(election_id, pos.id, "B");
        let votes: Vec<Vote> = (0..3)
            .map(|_| vote_for(election_id, pos.id, a.id))
            .chain((0..2).map(|_| vote_for(election_id, pos.id, b.id)))
            .collect();

        let results = tabulate(&[pos], &[a.clone(), b.clone()], &votes);

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.total_votes, 5);
        assert_eq!(result.abstentions, 0);
        assert_eq!(result.candidates[0].candidate_id, a.id);
        assert_eq!(result.candidates[0].vote_count, 3);
        assert_eq!(result.candidates[0].percentage, 60.0);
        assert_eq!(result.candidates[1].candidate_id, b.id);
        assert_eq!(result.candidates[1].vote_count, 2);
        assert_eq!(result.candidates[1].percentage, 40.0);
    }

    #[test]
    fn abstentions_count_toward_totals_only() {
        let election_id = Id::new();
        let pos = position(election_id, "President", 1);
        let a = candidate(election_id, pos.id, "A");
        let b = candidate(election_id, pos.id, "B");
        let votes = vec![
            vote_for(election_id, pos.id, a.id),
            vote_for(election_id, pos.id, b.id),
            abstention(election_id, pos.id),
        ];

        let results = tabulate(&[pos], &[a, b], &votes);

        let result = &results[0];
        assert_eq!(result.total_votes, 3);
        assert_eq!(result.abstentions, 1);
        // Percentages are over the two non-abstention votes.
        assert_eq!(result.candidates[0].percentage, 50.0);
        assert_eq!(result.candidates[1].percentage, 50.0);
    }

    #[test]
    fn no_votes_means_zero_percentages() {
        let election_id = Id::new();
        let pos = position(election_id, "President", 1);
        let a = candidate(election_id, pos.id, "A");

        let results = tabulate(&[pos], &[a], &[]);

        let result = &results[0];
        assert_eq!(result.total_votes, 0);
        assert_eq!(result.candidates[0].vote_count, 0);
        assert_eq!(result.candidates[0].percentage, 0.0);
    }

    #[test]
    fn ties_keep_input_order() {
        let election_id = Id::new();
        let pos = position(election_id, "President", 1);
        let a = candidate(election_id, pos.id, "A");
        let b = candidate(election_id, pos.id, "B");
        let c = candidate(election_id, pos.id, "C");
        let votes = vec![
            vote_for(election_id, pos.id, b.id),
            vote_for(election_id, pos.id, c.id),
        ];

        let results = tabulate(&[pos], &[a.clone(), b.clone(), c.clone()], &votes);

        // B and C tie at one vote each and stay in input order; A trails.
        let names: Vec<&str> = results[0].candidates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn positions_are_ordered_by_priority() {
        let election_id = Id::new();
        let second = position(election_id, "Secretary", 2);
        let first = position(election_id, "President", 1);

        let results = tabulate(&[second, first], &[], &[]);

        assert_eq!(results[0].title, "President");
        assert_eq!(results[1].title, "Secretary");
    }

    #[test]
    fn inactive_positions_are_excluded() {
        let election_id = Id::new();
        let mut retired = position(election_id, "Treasurer", 1);
        retired.position.is_active = false;
        let live = position(election_id, "President", 2);

        let results = tabulate(&[retired, live], &[], &[]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "President");
    }

    #[test]
    fn rounding_is_to_one_decimal() {
        let election_id = Id::new();
        let pos = position(election_id, "President", 1);
        let a = candidate(election_id, pos.id, "A");
        let b = candidate(election_id, pos.id, "B");
        let c = candidate(election_id, pos.id, "C");
        let votes = vec![
            vote_for(election_id, pos.id, a.id),
            vote_for(election_id, pos.id, b.id),
            vote_for(election_id, pos.id, c.id),
        ];

        let results = tabulate(&[pos], &[a, b, c], &votes);

        for tally in &results[0].candidates {
            assert_eq!(tally.percentage, 33.3);
        }
    }
}
