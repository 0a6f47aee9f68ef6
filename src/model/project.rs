use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vote-weighting rule configured per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMethod {
    /// Every vote counts as 1.0.
    OnePersonOneVote,
    /// Votes weighted by the voter's apartment size; percentages are
    /// relative to the sum of weights actually cast.
    WeightedBySizeAuto,
    /// Votes weighted by apartment size, but percentages are computed
    /// against the project's declared total area, so abstentions count
    /// against the total.
    WeightedBySizeManual,
}

impl VotingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::OnePersonOneVote => "one_person_one_vote",
            VotingMethod::WeightedBySizeAuto => "weighted_by_size_auto",
            VotingMethod::WeightedBySizeManual => "weighted_by_size_manual",
        }
    }

    /// Parse the stored column value. Returns `None` for anything
    /// unrecognized; callers surface that as a configuration failure
    /// instead of falling back to a default method.
    pub fn parse(raw: &str) -> Option<VotingMethod> {
        match raw {
            "one_person_one_vote" => Some(VotingMethod::OnePersonOneVote),
            "weighted_by_size_auto" => Some(VotingMethod::WeightedBySizeAuto),
            "weighted_by_size_manual" => Some(VotingMethod::WeightedBySizeManual),
            _ => None,
        }
    }

}

/// Lifecycle status, derived from the clock and the project's window.
/// Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Upcoming,
    Active,
    Ended,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Upcoming => write!(f, "upcoming"),
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Ended => write!(f, "ended"),
        }
    }
}

/// A voting project as stored. `voting_method` is kept as the raw column
/// value; use [`VotingProject::method`] to interpret it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VotingProject {
    pub id: String,
    pub title: String,
    pub voting_method: String,
    pub total_area: Option<f64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl VotingProject {
    pub fn method(&self) -> Option<VotingMethod> {
        VotingMethod::parse(&self.voting_method)
    }

    /// Derive the lifecycle status at `now`. Activation can open a window
    /// but never extend one: an unactivated project inside its dates is
    /// still upcoming, and anything past `end_date` is ended regardless
    /// of the flag.
    pub fn status(&self, now: DateTime<Utc>) -> ProjectStatus {
        if now < self.start_date {
            ProjectStatus::Upcoming
        } else if now > self.end_date {
            ProjectStatus::Ended
        } else if self.is_active {
            ProjectStatus::Active
        } else {
            ProjectStatus::Upcoming
        }
    }
}

/// A candidate registered on a project. Creation order (`created_at`,
/// then `id`) is the tie-break order when weighted totals are equal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Candidate {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A registered voter. `apartment_size` feeds vote weights under the
/// weighted methods.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Resident {
    pub id: String,
    pub name: String,
    pub apartment_size: f64,
}

/// A live vote row. `weight` is captured when the vote is cast and never
/// updated; revocation deletes the row outright.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Vote {
    pub id: String,
    pub project_id: String,
    pub candidate_id: String,
    pub voter_id: String,
    pub weight: f64,
    pub cast_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Optional cast location attached to a vote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}
