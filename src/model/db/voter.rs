use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_option_datetime, Id};

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Voter identifier issued by the administrators; unique within an
    /// election.
    pub voter_no: String,
    /// Transitions false to true exactly once, on the first accepted
    /// ballot set. Never reversed by normal operation.
    pub has_voted: bool,
    /// When the accepted ballot set was committed.
    #[serde(with = "serde_option_datetime")]
    pub voted_at: Option<DateTime<Utc>>,
}

impl VoterCore {
    /// Register a voter for an election.
    pub fn new(election_id: Id, voter_no: impl Into<String>) -> Self {
        Self {
            election_id,
            voter_no: voter_no.into(),
            has_voted: false,
            voted_at: None,
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
