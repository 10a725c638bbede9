use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

/// Connect, migrate, truncate. Returns None (and the caller skips) when
/// TEST_DATABASE_URL is not configured, so the suite passes without a
/// database.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query("TRUNCATE TABLE jobs RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("truncate failed");

    Some(pool)
}

#[allow(dead_code)]
pub async fn insert_job(pool: &PgPool, owner_id: &str, job_type: &str) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO jobs (owner_id, job_type, config_ref, status)
        VALUES ($1, $2, '{}'::jsonb, 'queued')
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(job_type)
    .fetch_one(pool)
    .await
    .expect("failed to insert job")
}

/// Force a row into a terminal state with a backdated completion time.
#[allow(dead_code)]
pub async fn force_terminal(pool: &PgPool, id: Uuid, status: &str, completed_days_ago: i64) {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = $2,
            completed_at = now() - ($3::int * interval '1 day'),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(completed_days_ago)
    .execute(pool)
    .await
    .expect("failed to force terminal state");
}

#[allow(dead_code)]
pub async fn job_status(pool: &PgPool, id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("failed to read job status")
}
