use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Tally for a single candidate within a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: Id,
    pub name: String,
    pub vote_count: u64,
    /// Share of the position's non-abstention votes, rounded to one
    /// decimal place. Zero when nobody has voted.
    pub percentage: f64,
}

/// Derived results for a single position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResult {
    pub position_id: Id,
    pub title: String,
    /// Sorted by vote count descending; ties keep their input order.
    pub candidates: Vec<CandidateTally>,
    /// Includes abstentions.
    pub total_votes: u64,
    pub abstentions: u64,
}

/// Voter turnout for an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationStats {
    pub total_voters: u64,
    pub voted: u64,
    pub remaining: u64,
    pub completion_percentage: u32,
}

impl ParticipationStats {
    pub fn new(total_voters: u64, voted: u64) -> Self {
        let completion_percentage = if total_voters == 0 {
            0
        } else {
            (voted as f64 / total_voters as f64 * 100.0).round() as u32
        };
        Self {
            total_voters,
            voted,
            remaining: total_voters.saturating_sub(voted),
            completion_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participation_rounds_to_whole_percent() {
        let stats = ParticipationStats::new(3, 2);
        assert_eq!(stats.remaining, 1);
        assert_eq!(stats.completion_percentage, 67);
    }

    #[test]
    fn participation_with_no_voters() {
        let stats = ParticipationStats::new(0, 0);
        assert_eq!(stats.remaining, 0);
        assert_eq!(stats.completion_percentage, 0);
    }

    #[test]
    fn participation_counts() {
        let stats = ParticipationStats::new(10, 4);
        assert_eq!(stats.voted, 4);
        assert_eq!(stats.remaining, 6);
        assert_eq!(stats.completion_percentage, 40);
    }
}
