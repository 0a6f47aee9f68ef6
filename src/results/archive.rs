use super::ResultSnapshot;
use crate::database::{DatabaseError, VotingDatabase};
use chrono::{DateTime, Utc};
use sqlx::Row;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("No archived snapshot for project: {0}")]
    NoData(String),
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Report-record storage for computed snapshots.
///
/// Archived snapshots exist for reporting and review surfaces; the
/// results engine never reads them, and a stored snapshot is only ever a
/// record of what a tally looked like at `computed_at`.
pub struct SnapshotArchive {
    db: VotingDatabase,
}

impl SnapshotArchive {
    pub fn new(db: VotingDatabase) -> Self {
        Self { db }
    }

    /// Persist a snapshot with the instant it was computed.
    pub async fn store(
        &self,
        snapshot: &ResultSnapshot,
        computed_at: DateTime<Utc>,
    ) -> ArchiveResult<()> {
        let snapshot_json = serde_json::to_string(snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO result_snapshots (project_id, snapshot_json, computed_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&snapshot.project_id)
        .bind(snapshot_json)
        .bind(computed_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// The most recently computed archived snapshot for a project.
    pub async fn latest_for_project(&self, project_id: &str) -> ArchiveResult<ResultSnapshot> {
        let row = sqlx::query(
            r#"
            SELECT snapshot_json
            FROM result_snapshots
            WHERE project_id = ?
            ORDER BY computed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => {
                let snapshot_json: String = row.get("snapshot_json");
                let snapshot: ResultSnapshot = serde_json::from_str(&snapshot_json)?;
                Ok(snapshot)
            }
            None => Err(ArchiveError::NoData(project_id.to_string())),
        }
    }
}
