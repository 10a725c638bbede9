// tests/claiming.rs
mod common;

use common::{insert_job, setup_db};

use claimq::jobs::{JobState, JobsRepo};
use serial_test::serial;
use std::collections::HashSet;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn two_concurrent_claimants_never_get_the_same_job() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let _job_id = insert_job(&pool, "u1", "datum_import").await;

    let repo_a = repo.clone();
    let repo_b = repo.clone();

    let (a, b) = tokio::join!(
        async move { repo_a.claim_queued_task().await.unwrap() },
        async move { repo_b.claim_queued_task().await.unwrap() },
    );

    let got_a = a.is_some();
    let got_b = b.is_some();

    // XOR: exactly one claimant wins the single queued row
    assert!(
        got_a ^ got_b,
        "expected exactly one winner, got_a={got_a}, got_b={got_b}"
    );

    let winner = a.or(b).unwrap();
    assert_eq!(winner.state(), Some(JobState::Claimed));
    assert!(winner.claimed_at.is_some());
}

#[tokio::test]
#[serial]
async fn n_claimants_over_m_jobs_claim_exactly_min_n_m() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    for i in 0..3 {
        let _ = insert_job(&pool, "u1", &format!("job-{i}")).await;
    }

    // 5 concurrent claimants racing for 3 queued rows.
    let mut handles = Vec::new();
    for _ in 0..5 {
        let repo = repo.clone();
        handles.push(tokio::spawn(
            async move { repo.claim_queued_task().await.unwrap() },
        ));
    }

    let mut claimed: Vec<Uuid> = Vec::new();
    for h in handles {
        if let Some(job) = h.await.unwrap() {
            claimed.push(job.id);
        }
    }

    assert_eq!(claimed.len(), 3, "exactly min(5, 3) claims should succeed");

    let distinct: HashSet<Uuid> = claimed.iter().copied().collect();
    assert_eq!(distinct.len(), claimed.len(), "a job was claimed twice");

    let queued_left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = 'queued'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(queued_left, 0);
}

#[tokio::test]
#[serial]
async fn claims_follow_insertion_order() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let first = insert_job(&pool, "u1", "first").await;
    let second = insert_job(&pool, "u1", "second").await;
    let third = insert_job(&pool, "u1", "third").await;

    let c1 = repo.claim_queued_task().await.unwrap().expect("a job");
    let c2 = repo.claim_queued_task().await.unwrap().expect("a job");
    let c3 = repo.claim_queued_task().await.unwrap().expect("a job");

    assert_eq!(c1.id, first);
    assert_eq!(c2.id, second);
    assert_eq!(c3.id, third);
}

#[tokio::test]
#[serial]
async fn claim_on_empty_store_returns_none() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    assert!(repo.claim_queued_task().await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn a_lost_race_leaves_the_row_queued_for_the_next_claimant() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let a = insert_job(&pool, "u1", "a").await;
    let b = insert_job(&pool, "u1", "b").await;

    // Claim the oldest; the second row must still be claimable afterwards.
    let first = repo.claim_queued_task().await.unwrap().expect("a job");
    assert_eq!(first.id, a);

    let second = repo.claim_queued_task().await.unwrap().expect("a job");
    assert_eq!(second.id, b);

    assert!(repo.claim_queued_task().await.unwrap().is_none());
}
