use chrono::{DateTime, Duration, TimeZone, Utc};
use community_vote::clock::FixedClock;
use community_vote::model::project::{Candidate, Resident, VotingProject};
use community_vote::results::archive::{ArchiveError, SnapshotArchive};
use community_vote::{CastRequest, ResultsEngine, TallyError, VoteCaster, VotingDatabase};
use std::sync::Arc;

fn window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn voting_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap()
}

async fn seed_project(db: &VotingDatabase, method: &str, total_area: Option<f64>) {
    db.upsert_project(&VotingProject {
        id: "p1".to_string(),
        title: "Facade insulation".to_string(),
        voting_method: method.to_string(),
        total_area,
        start_date: window_start(),
        end_date: window_start() + Duration::days(14),
        is_active: true,
        is_published: true,
        created_at: window_start() - Duration::days(7),
    })
    .await
    .expect("seed project");
}

/// Candidates registered one minute apart, in slice order.
async fn seed_candidates(db: &VotingDatabase, ids: &[&str]) {
    for (idx, id) in ids.iter().enumerate() {
        db.insert_candidate(&Candidate {
            id: id.to_string(),
            project_id: "p1".to_string(),
            name: format!("Proposal {}", id),
            is_active: true,
            created_at: window_start() - Duration::days(6) + Duration::minutes(idx as i64),
        })
        .await
        .expect("seed candidate");
    }
}

async fn seed_resident(db: &VotingDatabase, id: &str, apartment_size: f64) {
    db.upsert_resident(&Resident {
        id: id.to_string(),
        name: format!("Apartment {}", id),
        apartment_size,
    })
    .await
    .expect("seed resident");
}

fn caster(db: &VotingDatabase) -> VoteCaster {
    VoteCaster::new(db.clone(), Arc::new(FixedClock(voting_day())))
}

async fn cast(caster: &VoteCaster, vote_id: &str, candidate_id: &str, voter_id: &str) {
    caster
        .cast_vote(CastRequest {
            vote_id: vote_id.to_string(),
            project_id: "p1".to_string(),
            candidate_id: candidate_id.to_string(),
            voter_id: voter_id.to_string(),
            location: None,
        })
        .await
        .expect("cast vote");
}

#[tokio::test]
async fn zero_votes_yields_zero_percentages_and_no_winner() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "one_person_one_vote", None).await;
    seed_candidates(&db, &["c1", "c2", "c3"]).await;

    let snapshot = ResultsEngine::new(db).compute_results("p1").await.unwrap();

    assert_eq!(snapshot.winner_id, None);
    assert_eq!(snapshot.total_raw_votes, 0);
    assert_eq!(snapshot.total_weighted_votes, 0.0);
    assert_eq!(snapshot.candidates.len(), 3);
    for tally in &snapshot.candidates {
        assert_eq!(tally.raw_votes, 0);
        assert_eq!(tally.weighted_votes, 0.0);
        assert_eq!(tally.percentage, 0.0);
    }
}

#[tokio::test]
async fn raw_counts_match_the_vote_table() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "one_person_one_vote", None).await;
    seed_candidates(&db, &["c1", "c2"]).await;
    for (idx, voter) in ["r1", "r2", "r3", "r4", "r5"].iter().enumerate() {
        seed_resident(&db, voter, 50.0).await;
        let candidate = if idx % 2 == 0 { "c1" } else { "c2" };
        cast(&caster(&db), &format!("v{}", idx), candidate, voter).await;
    }

    let engine = ResultsEngine::new(db.clone());
    let snapshot = engine.compute_results("p1").await.unwrap();

    let raw_sum: i64 = snapshot.candidates.iter().map(|t| t.raw_votes).sum();
    assert_eq!(raw_sum, db.count_votes("p1").await.unwrap());
    assert_eq!(snapshot.total_raw_votes, 5);
}

#[tokio::test]
async fn one_person_one_vote_splits_by_vote_count() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "one_person_one_vote", None).await;
    seed_candidates(&db, &["c1", "c2", "c3"]).await;
    for voter in ["r1", "r2", "r3", "r4"] {
        // Apartment sizes differ, but must not influence this method.
        seed_resident(&db, voter, 120.0).await;
    }

    let caster = caster(&db);
    cast(&caster, "v1", "c1", "r1").await;
    cast(&caster, "v2", "c1", "r2").await;
    cast(&caster, "v3", "c2", "r3").await;
    cast(&caster, "v4", "c3", "r4").await;

    let snapshot = ResultsEngine::new(db).compute_results("p1").await.unwrap();

    assert_eq!(snapshot.winner_id.as_deref(), Some("c1"));
    assert_eq!(snapshot.total_weighted_votes, 4.0);
    let percentages: Vec<f64> = snapshot.candidates.iter().map(|t| t.percentage).collect();
    assert_eq!(percentages, vec![50.0, 25.0, 25.0]);
    let raw: Vec<i64> = snapshot.candidates.iter().map(|t| t.raw_votes).collect();
    assert_eq!(raw, vec![2, 1, 1]);
}

#[tokio::test]
async fn manual_weighting_counts_abstentions_against_total_area() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "weighted_by_size_manual", Some(1000.0)).await;
    seed_candidates(&db, &["c1", "c2"]).await;
    seed_resident(&db, "r1", 300.0).await;
    seed_resident(&db, "r2", 200.0).await;

    let caster = caster(&db);
    cast(&caster, "v1", "c1", "r1").await;
    cast(&caster, "v2", "c2", "r2").await;

    let snapshot = ResultsEngine::new(db).compute_results("p1").await.unwrap();

    // 30/20 against the declared 1000, not 60/40 against the 500 cast.
    let percentages: Vec<f64> = snapshot.candidates.iter().map(|t| t.percentage).collect();
    assert_eq!(percentages, vec![30.0, 20.0]);
    assert_eq!(snapshot.total_weighted_votes, 500.0);
    assert_eq!(snapshot.winner_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn auto_weighting_normalizes_to_votes_cast() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "weighted_by_size_auto", None).await;
    seed_candidates(&db, &["c1", "c2"]).await;
    seed_resident(&db, "r1", 300.0).await;
    seed_resident(&db, "r2", 200.0).await;

    let caster = caster(&db);
    cast(&caster, "v1", "c1", "r1").await;
    cast(&caster, "v2", "c2", "r2").await;

    let snapshot = ResultsEngine::new(db).compute_results("p1").await.unwrap();

    let percentages: Vec<f64> = snapshot.candidates.iter().map(|t| t.percentage).collect();
    assert_eq!(percentages, vec![60.0, 40.0]);
}

#[tokio::test]
async fn weights_are_captured_at_cast_time() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "weighted_by_size_auto", None).await;
    seed_candidates(&db, &["c1"]).await;
    seed_resident(&db, "r1", 80.0).await;
    cast(&caster(&db), "v1", "c1", "r1").await;

    // A later correction to the apartment registry must not rewrite
    // already-cast votes.
    seed_resident(&db, "r1", 999.0).await;

    let snapshot = ResultsEngine::new(db).compute_results("p1").await.unwrap();
    assert_eq!(snapshot.candidates[0].weighted_votes, 80.0);
}

#[tokio::test]
async fn ties_rank_by_candidate_creation_order() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "one_person_one_vote", None).await;
    seed_candidates(&db, &["c1", "c2", "c3"]).await;
    for voter in ["r1", "r2", "r3"] {
        seed_resident(&db, voter, 60.0).await;
    }

    // Equal totals everywhere; casting order deliberately reversed
    // relative to candidate registration.
    let caster = caster(&db);
    cast(&caster, "v1", "c3", "r1").await;
    cast(&caster, "v2", "c2", "r2").await;
    cast(&caster, "v3", "c1", "r3").await;

    let snapshot = ResultsEngine::new(db).compute_results("p1").await.unwrap();

    let order: Vec<&str> = snapshot.candidates.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(order, vec!["c1", "c2", "c3"]);
    assert_eq!(snapshot.winner_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn repeated_computation_is_byte_identical() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "weighted_by_size_auto", None).await;
    seed_candidates(&db, &["c1", "c2", "c3"]).await;
    for (idx, voter) in ["r1", "r2", "r3", "r4"].iter().enumerate() {
        seed_resident(&db, voter, 30.0 + idx as f64 * 17.5).await;
    }

    let caster = caster(&db);
    cast(&caster, "v1", "c2", "r1").await;
    cast(&caster, "v2", "c1", "r2").await;
    cast(&caster, "v3", "c3", "r3").await;
    cast(&caster, "v4", "c1", "r4").await;

    let engine = ResultsEngine::new(db);
    let first = serde_json::to_string(&engine.compute_results("p1").await.unwrap()).unwrap();
    let second = serde_json::to_string(&engine.compute_results("p1").await.unwrap()).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn revocation_restores_the_prior_snapshot() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "weighted_by_size_auto", None).await;
    seed_candidates(&db, &["c1", "c2"]).await;
    seed_resident(&db, "r1", 85.0).await;
    seed_resident(&db, "r2", 55.0).await;
    seed_resident(&db, "r3", 70.0).await;

    let caster = caster(&db);
    cast(&caster, "v1", "c1", "r1").await;
    cast(&caster, "v2", "c2", "r2").await;

    let engine = ResultsEngine::new(db);
    let before = serde_json::to_string(&engine.compute_results("p1").await.unwrap()).unwrap();

    cast(&caster, "v3", "c2", "r3").await;
    caster.revoke_vote("p1", "r3").await.unwrap();

    let after = serde_json::to_string(&engine.compute_results("p1").await.unwrap()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn missing_project_fails_with_project_not_found() {
    let db = VotingDatabase::in_memory().await.unwrap();

    let err = ResultsEngine::new(db)
        .compute_results("nope")
        .await
        .unwrap_err();

    assert!(matches!(err, TallyError::ProjectNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn unknown_voting_method_fails_loudly() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "ranked_choice", None).await;
    seed_candidates(&db, &["c1"]).await;

    let err = ResultsEngine::new(db)
        .compute_results("p1")
        .await
        .unwrap_err();

    assert!(matches!(err, TallyError::Configuration(_)));
}

#[tokio::test]
async fn manual_method_requires_a_positive_total_area() {
    for total_area in [None, Some(0.0), Some(-25.0)] {
        let db = VotingDatabase::in_memory().await.unwrap();
        seed_project(&db, "weighted_by_size_manual", total_area).await;
        seed_candidates(&db, &["c1"]).await;

        let err = ResultsEngine::new(db)
            .compute_results("p1")
            .await
            .unwrap_err();

        assert!(matches!(err, TallyError::Configuration(_)));
    }
}

#[tokio::test]
async fn votes_for_a_deactivated_candidate_are_an_integrity_failure() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "one_person_one_vote", None).await;
    seed_candidates(&db, &["c1", "c2"]).await;
    seed_resident(&db, "r1", 60.0).await;
    cast(&caster(&db), "v1", "c1", "r1").await;

    db.set_candidate_active("c1", false).await.unwrap();

    let err = ResultsEngine::new(db)
        .compute_results("p1")
        .await
        .unwrap_err();

    assert!(matches!(err, TallyError::Storage(_)));
}

#[tokio::test]
async fn archive_returns_the_latest_stored_snapshot() {
    let db = VotingDatabase::in_memory().await.unwrap();
    seed_project(&db, "one_person_one_vote", None).await;
    seed_candidates(&db, &["c1", "c2"]).await;
    seed_resident(&db, "r1", 60.0).await;
    seed_resident(&db, "r2", 60.0).await;

    let engine = ResultsEngine::new(db.clone());
    let archive = SnapshotArchive::new(db.clone());
    let caster = caster(&db);

    cast(&caster, "v1", "c1", "r1").await;
    let first = engine.compute_results("p1").await.unwrap();
    archive.store(&first, voting_day()).await.unwrap();

    cast(&caster, "v2", "c2", "r2").await;
    let second = engine.compute_results("p1").await.unwrap();
    archive
        .store(&second, voting_day() + Duration::hours(1))
        .await
        .unwrap();

    let latest = archive.latest_for_project("p1").await.unwrap();
    assert_eq!(latest, second);

    let err = archive.latest_for_project("p2").await.unwrap_err();
    assert!(matches!(err, ArchiveError::NoData(_)));
}
