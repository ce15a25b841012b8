use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The derived temporal state of an election.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElectionPhase {
    /// The voting window has not opened yet, or voting was manually closed.
    NotStarted,
    /// Accepting ballots.
    Active,
    /// The voting window has closed.
    Ended,
}

impl From<ElectionPhase> for Bson {
    fn from(phase: ElectionPhase) -> Self {
        to_bson(&phase).expect("Serialisation is infallible")
    }
}
