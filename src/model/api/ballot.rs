use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One entry of a ballot set: either a candidate for the position, or
/// an explicit abstention. A position with no entry at all is a
/// validation error, not an abstention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSpec {
    pub position_id: Id,
    pub candidate_id: Option<Id>,
    #[serde(default)]
    pub abstain: bool,
}

impl SelectionSpec {
    pub fn candidate(position_id: Id, candidate_id: Id) -> Self {
        Self {
            position_id,
            candidate_id: Some(candidate_id),
            abstain: false,
        }
    }

    pub fn abstention(position_id: Id) -> Self {
        Self {
            position_id,
            candidate_id: None,
            abstain: true,
        }
    }
}

/// A complete ballot set: one selection per active position, submitted
/// by one voter in one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    pub voter_id: Id,
    pub selections: Vec<SelectionSpec>,
}

/// Returned to the voter on an accepted ballot set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub accepted: bool,
    pub votes_recorded: usize,
    pub voted_at: DateTime<Utc>,
}
