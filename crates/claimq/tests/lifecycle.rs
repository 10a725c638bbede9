// tests/lifecycle.rs
mod common;

use common::{insert_job, job_status, setup_db};

use claimq::jobs::{JobResult, JobState, JobsRepo};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn claimed_job_runs_linearly_to_completed() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let id = insert_job(&pool, "u1", "datum_import").await;

    let claimed = repo.claim_queued_task().await.unwrap().expect("a job");
    assert_eq!(claimed.id, id);
    assert!(claimed.claimed_at.is_some());

    assert!(repo.mark_executing(id).await.unwrap());
    assert_eq!(job_status(&pool, id).await, "executing");

    let result = JobResult::new(42, "imported 42 records");
    assert!(repo.mark_completed(id, &result).await.unwrap());

    let job = repo.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.state(), Some(JobState::Completed));
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());

    let stored: JobResult = serde_json::from_value(job.result_json.unwrap()).unwrap();
    assert_eq!(stored.items_processed, 42);
}

#[tokio::test]
#[serial]
async fn transitions_are_guarded_by_current_state() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let id = insert_job(&pool, "u1", "datum_import").await;

    // queued -> executing is not a legal transition
    assert!(!repo.mark_executing(id).await.unwrap());

    let _ = repo.claim_queued_task().await.unwrap().expect("a job");

    // claimed -> completed skips executing and must be rejected
    assert!(!repo.mark_completed(id, &JobResult::default()).await.unwrap());

    assert!(repo.mark_executing(id).await.unwrap());
    assert!(repo.mark_completed(id, &JobResult::default()).await.unwrap());

    // terminal rows accept no further transitions
    assert!(!repo.mark_executing(id).await.unwrap());
    assert!(!repo.mark_error(id, "late failure", None).await.unwrap());
    assert_eq!(job_status(&pool, id).await, "completed");
}

#[tokio::test]
#[serial]
async fn failed_job_records_detail_and_stays_error() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let id = insert_job(&pool, "u1", "datum_export").await;
    let _ = repo.claim_queued_task().await.unwrap().expect("a job");
    assert!(repo.mark_executing(id).await.unwrap());

    assert!(repo
        .mark_error(id, "BAD_CONFIG: missing source", None)
        .await
        .unwrap());

    let job = repo.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.state(), Some(JobState::Error));
    assert_eq!(job.error_message.as_deref(), Some("BAD_CONFIG: missing source"));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
#[serial]
async fn progress_is_monotonic_and_clamped() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let id = insert_job(&pool, "u1", "datum_import").await;

    repo.set_progress(id, 50).await.unwrap();
    repo.set_progress(id, 30).await.unwrap();

    let job = repo.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.progress_pct, Some(50), "progress must never go backwards");

    repo.set_progress(id, 250).await.unwrap();
    let job = repo.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.progress_pct, Some(100));
}

#[tokio::test]
#[serial]
async fn requeue_resets_only_error_rows() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    let id = insert_job(&pool, "u1", "datum_import").await;
    let _ = repo.claim_queued_task().await.unwrap().expect("a job");
    assert!(repo.mark_executing(id).await.unwrap());
    repo.set_progress(id, 80).await.unwrap();
    assert!(repo.mark_error(id, "boom", None).await.unwrap());

    assert!(repo.requeue(id).await.unwrap());

    let job = repo.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.state(), Some(JobState::Queued));
    assert!(job.claimed_at.is_none());
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());
    assert!(job.error_message.is_none());
    assert!(job.progress_pct.is_none());

    // A queued row cannot be requeued again.
    assert!(!repo.requeue(id).await.unwrap());

    // Neither can a completed one.
    let completed = insert_job(&pool, "u2", "x").await;
    common::force_terminal(&pool, completed, "completed", 0).await;
    assert!(!repo.requeue(completed).await.unwrap());
}
