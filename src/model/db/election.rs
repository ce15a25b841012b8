use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Display title.
    pub title: String,
    /// The configured voting date, as entered by an admin.
    /// May arrive as `MM/DD/YYYY` or ISO `YYYY-MM-DD`; the clock
    /// normalises both before any comparison.
    pub election_date: Option<String>,
    /// Voting start time of day, `HH:MM`. Defaults to 08:00 when unset.
    pub start_time: Option<String>,
    /// Voting end time of day, `HH:MM`. Defaults to 17:00 when unset.
    pub end_time: Option<String>,
    /// Is this the current election? At most one election has this set,
    /// enforced by a partial unique index.
    pub is_current: bool,
    /// Manual override: `Some(true)` forces voting open, `Some(false)`
    /// forces it closed, `None` follows the schedule.
    pub is_active: Option<bool>,
    /// Have the results been published?
    pub results_published: bool,
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionCore {
        pub fn example() -> Self {
            Self {
                title: "Student Council 2026".to_string(),
                election_date: Some("2026-03-15".to_string()),
                start_time: None,
                end_time: None,
                is_current: true,
                is_active: None,
                results_published: false,
            }
        }
    }
}
