/// Vote casting and revocation. Weights are determined here, when the vote
/// is cast; the results engine only ever reads what this module wrote.
use crate::clock::Clock;
use crate::database::{DatabaseError, VotingDatabase};
use crate::model::project::{GeoPoint, ProjectStatus, Vote, VotingMethod};
use sqlx::error::DatabaseError as _;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("candidate not found on project: {0}")]
    CandidateNotFound(String),
    #[error("resident not found: {0}")]
    ResidentNotFound(String),
    #[error("project {0} is not published")]
    NotPublished(String),
    #[error("voting is {status} for project {project_id}")]
    VotingClosed {
        project_id: String,
        status: ProjectStatus,
    },
    #[error("voter {voter_id} already holds a live vote on project {project_id}")]
    AlreadyVoted {
        project_id: String,
        voter_id: String,
    },
    #[error("no live vote for voter {voter_id} on project {project_id}")]
    NoLiveVote {
        project_id: String,
        voter_id: String,
    },
    #[error("invalid project configuration: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<sqlx::Error> for CastError {
    fn from(error: sqlx::Error) -> Self {
        CastError::Storage(DatabaseError::Sqlx(error))
    }
}

pub type CastResult<T> = std::result::Result<T, CastError>;

/// A cast request from the surrounding application. Identifiers are opaque
/// strings minted by the caller.
#[derive(Debug, Clone)]
pub struct CastRequest {
    pub vote_id: String,
    pub project_id: String,
    pub candidate_id: String,
    pub voter_id: String,
    pub location: Option<GeoPoint>,
}

pub struct VoteCaster {
    db: VotingDatabase,
    clock: Arc<dyn Clock>,
}

impl VoteCaster {
    pub fn new(db: VotingDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn with_system_clock(db: VotingDatabase) -> Self {
        Self::new(db, Arc::new(crate::clock::SystemClock))
    }

    /// Cast a vote. The project must be published and inside its open
    /// window at the clock's current time. A voter with a live vote on the
    /// project must revoke before recasting; casting never overwrites.
    pub async fn cast_vote(&self, request: CastRequest) -> CastResult<Vote> {
        let project = self
            .db
            .get_project(&request.project_id)
            .await?
            .ok_or_else(|| CastError::ProjectNotFound(request.project_id.clone()))?;

        if !project.is_published {
            return Err(CastError::NotPublished(project.id));
        }

        let now = self.clock.now();
        let status = project.status(now);
        if status != ProjectStatus::Active {
            return Err(CastError::VotingClosed {
                project_id: project.id,
                status,
            });
        }

        let method = project.method().ok_or_else(|| {
            CastError::Configuration(format!(
                "unrecognized voting method '{}' on project {}",
                project.voting_method, project.id
            ))
        })?;

        let candidate = self
            .db
            .get_candidate(&request.candidate_id)
            .await?
            .filter(|c| c.project_id == project.id && c.is_active)
            .ok_or_else(|| CastError::CandidateNotFound(request.candidate_id.clone()))?;

        let resident = self
            .db
            .get_resident(&request.voter_id)
            .await?
            .ok_or_else(|| CastError::ResidentNotFound(request.voter_id.clone()))?;

        // Weight is captured now and never recomputed. Both weighted
        // methods store the raw apartment size; they differ only in the
        // percentage denominator at aggregation time.
        let weight = match method {
            VotingMethod::OnePersonOneVote => 1.0,
            VotingMethod::WeightedBySizeAuto | VotingMethod::WeightedBySizeManual => {
                resident.apartment_size
            }
        };

        let vote = Vote {
            id: request.vote_id,
            project_id: project.id.clone(),
            candidate_id: candidate.id,
            voter_id: resident.id,
            weight,
            cast_at: now,
            latitude: request.location.map(|p| p.latitude),
            longitude: request.location.map(|p| p.longitude),
        };

        let mut tx = self.db.pool().begin().await?;

        let existing = sqlx::query("SELECT id FROM votes WHERE project_id = ? AND voter_id = ?")
            .bind(&vote.project_id)
            .bind(&vote.voter_id)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            tx.rollback().await?;
            return Err(CastError::AlreadyVoted {
                project_id: vote.project_id,
                voter_id: vote.voter_id,
            });
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO votes
                (id, project_id, candidate_id, voter_id, weight, cast_at,
                 latitude, longitude)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vote.id)
        .bind(&vote.project_id)
        .bind(&vote.candidate_id)
        .bind(&vote.voter_id)
        .bind(vote.weight)
        .bind(vote.cast_at)
        .bind(vote.latitude)
        .bind(vote.longitude)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // The unique index is the last line of defense against a
            // concurrent cast that landed between the check and the insert.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tx.rollback().await?;
                return Err(CastError::AlreadyVoted {
                    project_id: vote.project_id,
                    voter_id: vote.voter_id,
                });
            }
            Err(other) => return Err(other.into()),
        }

        tx.commit().await?;

        tracing::info!(
            project_id = %vote.project_id,
            voter_id = %vote.voter_id,
            weight = vote.weight,
            "vote cast"
        );

        Ok(vote)
    }

    /// Revoke the voter's live vote on a project. The row is deleted
    /// outright; a subsequent tally looks exactly as it did before the
    /// vote was cast.
    pub async fn revoke_vote(&self, project_id: &str, voter_id: &str) -> CastResult<()> {
        let result = sqlx::query("DELETE FROM votes WHERE project_id = ? AND voter_id = ?")
            .bind(project_id)
            .bind(voter_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CastError::NoLiveVote {
                project_id: project_id.to_string(),
                voter_id: voter_id.to_string(),
            });
        }

        tracing::info!(project_id, voter_id, "vote revoked");
        Ok(())
    }
}
