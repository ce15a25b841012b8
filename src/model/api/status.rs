use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::phase::ElectionPhase;

/// Public view of the election state.
///
/// Always answerable: storage problems fall back to the last cached
/// value or [`ElectionStatus::fallback`], because the whole voting UI
/// depends on this answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionStatus {
    pub status: ElectionPhase,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub results_published: bool,
    /// Set when this view was served from an expired cache entry during
    /// a storage outage.
    #[serde(default)]
    pub stale: bool,
}

impl ElectionStatus {
    /// The safe default served when no election is configured, or when
    /// storage is down and nothing is cached yet.
    pub fn fallback() -> Self {
        Self {
            status: ElectionPhase::NotStarted,
            window_start: None,
            window_end: None,
            results_published: false,
            stale: false,
        }
    }
}
