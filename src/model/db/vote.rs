use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core vote data: one row per (voter, election, position).
///
/// A vote, once recorded, is immutable; corrections require
/// administrative deletion of the voter record, not vote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    /// Foreign Key voter ID.
    pub voter_id: Id,
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key position ID.
    pub position_id: Id,
    /// Absent when this row records an explicit abstention.
    pub candidate_id: Option<Id>,
    /// Abstentions count toward participation and position totals but
    /// never toward any candidate.
    pub is_abstention: bool,
    /// All rows of one ballot set share this value. A failed submission
    /// is compensated by deleting its submission ID, which also removes
    /// rows whose insert landed server-side after timing out client-side.
    pub submission_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl VoteCore {
    /// A vote for a candidate.
    pub fn for_candidate(
        voter_id: Id,
        election_id: Id,
        position_id: Id,
        candidate_id: Id,
        submission_id: Id,
    ) -> Self {
        Self {
            voter_id,
            election_id,
            position_id,
            candidate_id: Some(candidate_id),
            is_abstention: false,
            submission_id,
            cast_at: Utc::now(),
        }
    }

    /// An explicit abstention: a recorded, intentional non-choice,
    /// distinct from not voting at all.
    pub fn abstention(voter_id: Id, election_id: Id, position_id: Id, submission_id: Id) -> Self {
        Self {
            voter_id,
            election_id,
            position_id,
            candidate_id: None,
            is_abstention: true,
            submission_id,
            cast_at: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
