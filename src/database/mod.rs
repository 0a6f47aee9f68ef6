pub mod casting;
pub mod schema;

use crate::model::project::{Candidate, Resident, Vote, VotingProject};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Store for projects, candidates, residents and live votes.
#[derive(Clone)]
pub struct VotingDatabase {
    pool: SqlitePool,
}

impl VotingDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        schema::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database for tests and benchmarks. The pool is pinned to
    /// one connection: every new SQLite `:memory:` connection is a
    /// separate empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        schema::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or update a project. `created_at` is kept from the first
    /// insert.
    pub async fn upsert_project(&self, project: &VotingProject) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, title, voting_method, total_area, start_date, end_date,
                 is_active, is_published, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                voting_method = excluded.voting_method,
                total_area = excluded.total_area,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                is_active = excluded.is_active,
                is_published = excluded.is_published
            "#,
        )
        .bind(&project.id)
        .bind(&project.title)
        .bind(&project.voting_method)
        .bind(project.total_area)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.is_active)
        .bind(project.is_published)
        .bind(project.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flip the activation flag on an existing project.
    pub async fn set_project_active(&self, project_id: &str, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Integrity(format!(
                "no such project: {}",
                project_id
            )));
        }

        Ok(())
    }

    /// Flip the published flag on an existing project.
    pub async fn set_project_published(&self, project_id: &str, published: bool) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET is_published = ? WHERE id = ?")
            .bind(published)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Integrity(format!(
                "no such project: {}",
                project_id
            )));
        }

        Ok(())
    }

    pub async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO candidates (id, project_id, name, is_active, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.project_id)
        .bind(&candidate.name)
        .bind(candidate.is_active)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_candidate_active(&self, candidate_id: &str, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE candidates SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Integrity(format!(
                "no such candidate: {}",
                candidate_id
            )));
        }

        Ok(())
    }

    /// Insert or update a resident and their apartment size. Size changes
    /// never touch already-cast votes; weights are captured at cast time.
    pub async fn upsert_resident(&self, resident: &Resident) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO residents (id, name, apartment_size)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                apartment_size = excluded.apartment_size
            "#,
        )
        .bind(&resident.id)
        .bind(&resident.name)
        .bind(resident.apartment_size)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Option<VotingProject>> {
        let project = sqlx::query_as::<_, VotingProject>(
            r#"
            SELECT id, title, voting_method, total_area, start_date, end_date,
                   is_active, is_published, created_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    /// Active candidates for a project, in creation order. This ordering
    /// breaks ties in the results ranking, so it must be total:
    /// `created_at` first, `id` second.
    pub async fn get_active_candidates(&self, project_id: &str) -> Result<Vec<Candidate>> {
        let candidates = sqlx::query_as::<_, Candidate>(
            r#"
            SELECT id, project_id, name, is_active, created_at
            FROM candidates
            WHERE project_id = ? AND is_active = 1
            ORDER BY created_at, id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    pub async fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>> {
        let candidate = sqlx::query_as::<_, Candidate>(
            r#"
            SELECT id, project_id, name, is_active, created_at
            FROM candidates
            WHERE id = ?
            "#,
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(candidate)
    }

    pub async fn get_resident(&self, resident_id: &str) -> Result<Option<Resident>> {
        let resident = sqlx::query_as::<_, Resident>(
            "SELECT id, name, apartment_size FROM residents WHERE id = ?",
        )
        .bind(resident_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resident)
    }

    /// All live votes for a project. Unordered; the results engine imposes
    /// its own deterministic ordering.
    pub async fn get_votes_for_project(&self, project_id: &str) -> Result<Vec<Vote>> {
        let votes = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, project_id, candidate_id, voter_id, weight, cast_at,
                   latitude, longitude
            FROM votes
            WHERE project_id = ?
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(project_id, votes = votes.len(), "loaded vote rows");
        Ok(votes)
    }

    /// The voter's live vote on a project, if any.
    pub async fn get_vote_for_voter(
        &self,
        project_id: &str,
        voter_id: &str,
    ) -> Result<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, project_id, candidate_id, voter_id, weight, cast_at,
                   latitude, longitude
            FROM votes
            WHERE project_id = ? AND voter_id = ?
            "#,
        )
        .bind(project_id)
        .bind(voter_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vote)
    }

    pub async fn count_votes(&self, project_id: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE project_id = ?")
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
