use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PurgeRepo {
    pool: PgPool,
}

impl PurgeRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete terminal jobs whose completion is strictly older than `older_than`.
    /// `include_error` is deployment policy: when false only `completed` rows
    /// qualify. Returns the number of rows removed.
    ///
    /// Only terminal rows are touched, so this is safe to run concurrently
    /// with claims and with workers transitioning other rows. Idempotent:
    /// once nothing qualifies the count is 0.
    pub async fn purge_completed_tasks(
        &self,
        older_than: DateTime<Utc>,
        include_error: bool,
    ) -> anyhow::Result<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE (status = 'completed' OR ($2 AND status = 'error'))
              AND completed_at IS NOT NULL
              AND completed_at < $1
            "#,
        )
        .bind(older_than)
        .bind(include_error)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}

/// Convenience: compute cutoff like "now - N days"
pub fn cutoff_days(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
