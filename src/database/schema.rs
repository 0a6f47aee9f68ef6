use crate::database::{DatabaseError, Result};
/// Schema definitions and integrity checks for the voting store.
use sqlx::SqlitePool;

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Create projects table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            voting_method TEXT NOT NULL,
            total_area REAL,
            start_date TIMESTAMP NOT NULL,
            end_date TIMESTAMP NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create candidates table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL,
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create residents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS residents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            apartment_size REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create votes table. The (project_id, voter_id) uniqueness backs the
    // one-live-vote-per-voter invariant even under concurrent casts.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            candidate_id TEXT NOT NULL,
            voter_id TEXT NOT NULL,
            weight REAL NOT NULL,
            cast_at TIMESTAMP NOT NULL,
            latitude REAL,
            longitude REAL,
            FOREIGN KEY (project_id) REFERENCES projects(id),
            FOREIGN KEY (candidate_id) REFERENCES candidates(id),
            FOREIGN KEY (voter_id) REFERENCES residents(id),
            UNIQUE(project_id, voter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create result_snapshots table for archived (non-authoritative) tallies
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS result_snapshots (
            id INTEGER PRIMARY KEY,
            project_id TEXT NOT NULL,
            snapshot_json TEXT NOT NULL,
            computed_at TIMESTAMP NOT NULL,
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_indexes(pool).await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_candidates_project ON candidates(project_id)",
        "CREATE INDEX IF NOT EXISTS idx_votes_project ON votes(project_id)",
        "CREATE INDEX IF NOT EXISTS idx_votes_candidate ON votes(candidate_id)",
        "CREATE INDEX IF NOT EXISTS idx_result_snapshots_project ON result_snapshots(project_id, computed_at)",
    ];

    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    Ok(())
}

/// Verify database schema integrity
pub async fn verify_schema(pool: &SqlitePool) -> Result<()> {
    // Check that all expected tables exist
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let expected_tables = vec![
        "candidates",
        "projects",
        "residents",
        "result_snapshots",
        "votes",
    ];

    for expected in &expected_tables {
        if !tables.iter().any(|name| name == expected) {
            return Err(DatabaseError::Integrity(format!(
                "Missing table: {}",
                expected
            )));
        }
    }

    Ok(())
}
