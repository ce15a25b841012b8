use serde::{Deserialize, Serialize};

/// The singleton settings record: a secondary, independently-edited copy
/// of the voting window and publication flags. Used as a fallback when
/// the election record is incomplete, and kept in sync (best-effort)
/// when status flags change.
///
/// At most one settings document exists; when absent, a default is
/// synthesized on first read rather than inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub election_title: Option<String>,
    /// Fallback voting date, same accepted formats as the election's.
    pub voting_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Mirror of the current election's manual override flag.
    pub is_active: bool,
    /// Mirror of the current election's publication flag.
    pub results_published: bool,
}
