use super::{CandidateTally, ResultSnapshot, TallyError, TallyResult};
use crate::database::{DatabaseError, VotingDatabase};
use crate::model::project::{Vote, VotingMethod};
use itertools::Itertools;
use std::collections::HashMap;

/// Computes result snapshots from the live vote table.
///
/// Read-only: safe to invoke concurrently with casting and revocation,
/// and from any number of callers at once. Each call reflects whatever
/// committed state the reads observe.
pub struct ResultsEngine {
    db: VotingDatabase,
}

impl ResultsEngine {
    pub fn new(db: VotingDatabase) -> Self {
        Self { db }
    }

    /// Tally all live votes for a project into a ranked snapshot.
    ///
    /// Either fully succeeds or fails; there is no partial tally. The
    /// output is deterministic for a given committed vote set, including
    /// candidate ordering.
    pub async fn compute_results(&self, project_id: &str) -> TallyResult<ResultSnapshot> {
        let project = self
            .db
            .get_project(project_id)
            .await?
            .ok_or_else(|| TallyError::ProjectNotFound(project_id.to_string()))?;

        let method = project.method().ok_or_else(|| {
            TallyError::Configuration(format!(
                "unrecognized voting method '{}' on project {}",
                project.voting_method, project.id
            ))
        })?;

        // The manual method measures percentages against the declared
        // total area, so that value must be present and usable up front.
        let declared_area = match method {
            VotingMethod::WeightedBySizeManual => {
                let area = project.total_area.filter(|a| *a > 0.0).ok_or_else(|| {
                    TallyError::Configuration(format!(
                        "project {} uses manual weighting but declares no positive total area",
                        project.id
                    ))
                })?;
                Some(area)
            }
            _ => None,
        };

        let candidates = self.db.get_active_candidates(&project.id).await?;
        let votes = self.db.get_votes_for_project(&project.id).await?;

        // A vote row pointing outside the active candidate set would make
        // the raw counts disagree with the vote table. Surface it rather
        // than silently dropping rows.
        let known: std::collections::HashSet<&str> =
            candidates.iter().map(|c| c.id.as_str()).collect();
        if let Some(stray) = votes.iter().find(|v| !known.contains(v.candidate_id.as_str())) {
            return Err(TallyError::Storage(DatabaseError::Integrity(format!(
                "vote {} references unknown or inactive candidate {}",
                stray.id, stray.candidate_id
            ))));
        }

        let votes_by_candidate: HashMap<&str, Vec<&Vote>> = votes
            .iter()
            .into_group_map_by(|v| v.candidate_id.as_str());

        let total_raw_votes = votes.len() as i64;
        let total_weighted_votes: f64 = votes.iter().map(|v| v.weight).sum();

        let denominator = declared_area.unwrap_or(total_weighted_votes);

        // Candidates arrive in creation order; carry that position so the
        // tie-break is explicit in the comparator instead of leaning on
        // sort stability.
        let mut tallies: Vec<(usize, CandidateTally)> = candidates
            .iter()
            .enumerate()
            .map(|(registration, candidate)| {
                let rows = votes_by_candidate
                    .get(candidate.id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let raw_votes = rows.len() as i64;
                let weighted_votes: f64 = rows.iter().map(|v| v.weight).sum();
                let percentage = if denominator > 0.0 {
                    round_one_decimal(weighted_votes / denominator * 100.0)
                } else {
                    0.0
                };

                (
                    registration,
                    CandidateTally {
                        id: candidate.id.clone(),
                        name: candidate.name.clone(),
                        raw_votes,
                        weighted_votes,
                        percentage,
                    },
                )
            })
            .collect();

        tallies.sort_by(|(reg_a, a), (reg_b, b)| {
            b.weighted_votes
                .total_cmp(&a.weighted_votes)
                .then(reg_a.cmp(reg_b))
        });

        let ranked: Vec<CandidateTally> = tallies.into_iter().map(|(_, t)| t).collect();

        let winner_id = if total_raw_votes == 0 {
            None
        } else {
            ranked.first().map(|t| t.id.clone())
        };

        tracing::debug!(
            project_id = %project.id,
            method = method.as_str(),
            votes = total_raw_votes,
            "computed result snapshot"
        );

        Ok(ResultSnapshot {
            project_id: project.id,
            voting_method: method,
            candidates: ranked,
            winner_id,
            total_raw_votes,
            total_weighted_votes,
        })
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
