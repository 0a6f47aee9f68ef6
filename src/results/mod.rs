use crate::database::DatabaseError;
use crate::model::project::VotingMethod;
use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod archive;

#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("invalid project configuration: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(#[from] DatabaseError),
}

pub type TallyResult<T> = std::result::Result<T, TallyError>;

/// One candidate's line in a result snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub id: String,
    pub name: String,
    #[serde(rename = "rawVotes")]
    pub raw_votes: i64,
    #[serde(rename = "weightedVotes")]
    pub weighted_votes: f64,
    /// Share of the method's denominator, rounded to one decimal. Under
    /// the manual method the denominator is the declared total area, so
    /// percentages can sum to less than 100.
    pub percentage: f64,
}

/// Point-in-time tally for a project. Computed on demand from the live
/// vote table; never authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "votingMethod")]
    pub voting_method: VotingMethod,
    /// Ranked best-first: weighted total descending, ties broken by
    /// candidate creation order.
    pub candidates: Vec<CandidateTally>,
    #[serde(rename = "winnerId")]
    pub winner_id: Option<String>,
    #[serde(rename = "totalRawVotes")]
    pub total_raw_votes: i64,
    #[serde(rename = "totalWeightedVotes")]
    pub total_weighted_votes: f64,
}
