use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core position data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Display title, unique within an election.
    pub title: String,
    /// Display and tie-break order, ascending.
    pub priority: i32,
    /// Cap on the number of winners.
    pub max_candidates: u32,
    /// Cap on selections per ballot; effectively 1 in this design.
    pub max_selections: u32,
    /// Inactive positions are excluded from ballots and results.
    pub is_active: bool,
}

/// A position without an ID.
pub type NewPosition = PositionCore;

/// A position from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub position: PositionCore,
}

impl Deref for Position {
    type Target = PositionCore;

    fn deref(&self) -> &Self::Target {
        &self.position
    }
}

impl DerefMut for Position {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.position
    }
}
