// crates/claimq/src/jobs/repo.rs

use crate::jobs::model::{Job, JobResult, JobState, NewJob};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres codes treated as claim contention rather than errors:
/// lock_not_available and serialization_failure.
const TRANSIENT_CONFLICT_CODES: [&str; 2] = ["55P03", "40001"];

fn is_transient_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .map(|c| TRANSIENT_CONFLICT_CODES.contains(&c.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Enqueue helpers
    // ----------------------------

    pub async fn enqueue(&self, job: NewJob) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (owner_id, job_type, config_ref, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&job.owner_id)
        .bind(&job.job_type)
        .bind(&job.config_ref)
        .bind(JobState::Queued.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn enqueue_now(
        &self,
        owner_id: &str,
        job_type: &str,
        config_ref: serde_json::Value,
    ) -> anyhow::Result<Uuid> {
        self.enqueue(NewJob {
            owner_id: owner_id.to_string(),
            job_type: job_type.to_string(),
            config_ref,
        })
        .await
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Jobs belonging to one owner, optionally narrowed to a set of states.
    /// An empty `states` slice means no state constraint.
    pub async fn find_for_owner(
        &self,
        owner_id: &str,
        states: &[JobState],
    ) -> anyhow::Result<Vec<Job>> {
        let states: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();

        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT *
            FROM jobs
            WHERE owner_id = $1
              AND (cardinality($2::text[]) = 0 OR status = ANY($2))
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .bind(&states)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Owner-scoped bulk delete, restricted to the given ids and states.
    /// An empty `states` slice means any state qualifies. Returns rows removed.
    pub async fn delete_for_owner(
        &self,
        owner_id: &str,
        ids: &[Uuid],
        states: &[JobState],
    ) -> anyhow::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let states: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();

        let res = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE owner_id = $1
              AND id = ANY($2)
              AND (cardinality($3::text[]) = 0 OR status = ANY($3))
            "#,
        )
        .bind(owner_id)
        .bind(ids)
        .bind(&states)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    /// Row counts per status, for operational tooling.
    pub async fn counts_by_status(&self) -> anyhow::Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ----------------------------
    // Claim protocol
    // ----------------------------

    /// Claim the oldest queued job, or None if nothing is claimable.
    ///
    /// Correctness: SELECT ... FOR UPDATE SKIP LOCKED, then the claimed
    /// transition, in one transaction. The row lock taken by the SELECT makes
    /// the whole select-and-transition indivisible; two racing claimants each
    /// get a distinct row or None, never the same row. Never split this into
    /// a read on one connection and a write on another.
    ///
    /// Lock contention and serialization failures resolve to Ok(None); the
    /// next tick simply tries again.
    pub async fn claim_queued_task(&self) -> anyhow::Result<Option<Job>> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) if is_transient_conflict(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let candidate = match sqlx::query_as::<_, Job>(
            r#"
            SELECT *
            FROM jobs
            WHERE status = 'queued'
            ORDER BY created_at ASC, id ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        {
            Ok(c) => c,
            Err(e) if is_transient_conflict(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(job) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let claimed = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'claimed',
                claimed_at = now(),
                updated_at = now()
            WHERE id = $1
              AND status = 'queued'
            RETURNING *
            "#,
        )
        .bind(job.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(claimed))
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    /// claimed -> executing, before the domain collaborator is invoked.
    /// Returns false if the row was not in `claimed`.
    pub async fn mark_executing(&self, job_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'executing',
                started_at = now(),
                updated_at = now()
            WHERE id = $1
              AND status = 'claimed'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// executing -> completed, with the result summary.
    pub async fn mark_completed(&self, job_id: Uuid, result: &JobResult) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                result_json = $2,
                completed_at = now(),
                updated_at = now()
            WHERE id = $1
              AND status = 'executing'
            "#,
        )
        .bind(job_id)
        .bind(serde_json::to_value(result)?)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// executing -> error, with failure detail. No automatic retry: the row
    /// stays in `error` until an operator requeues or the purge removes it.
    pub async fn mark_error(
        &self,
        job_id: Uuid,
        error_message: &str,
        partial_result: Option<&JobResult>,
    ) -> anyhow::Result<bool> {
        let result_json = match partial_result {
            Some(r) => Some(serde_json::to_value(r)?),
            None => None,
        };

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'error',
                error_message = $2,
                result_json = $3,
                completed_at = now(),
                updated_at = now()
            WHERE id = $1
              AND status = 'executing'
            "#,
        )
        .bind(job_id)
        .bind(error_message)
        .bind(result_json)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Advisory progress update. GREATEST keeps the column monotonic even if
    /// updates arrive out of order.
    pub async fn set_progress(&self, job_id: Uuid, pct: i32) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress_pct = GREATEST(COALESCE(progress_pct, 0), $2),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(pct.clamp(0, 100))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Explicit operator reset of a failed job back to `queued`. This is not
    /// part of the claim protocol; it is logged as a distinct audited action.
    pub async fn requeue(&self, job_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                claimed_at = NULL,
                started_at = NULL,
                completed_at = NULL,
                result_json = NULL,
                error_message = NULL,
                progress_pct = NULL,
                updated_at = now()
            WHERE id = $1
              AND status = 'error'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        let requeued = res.rows_affected() == 1;
        if requeued {
            tracing::info!(job_id = %job_id, "job requeued from error state");
        }
        Ok(requeued)
    }
}
