use claimq::jobs::{cutoff_days, JobsRepo, PurgeRepo};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "claimqctl <command>\n\
             Commands:\n\
             - reset\n\
             - seed <n>\n\
             - demo\n\
             - counts\n\
             - show <job_id>\n\
             - purge <days>\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .expect("DATABASE_URL or TEST_DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    match args[1].as_str() {
        "reset" => reset(&pool).await?,
        "seed" => {
            let n: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(&pool, n).await?;
        }
        "demo" => {
            reset(&pool).await?;
            seed(&pool, 5).await?;
            show_counts(&pool).await?;
        }
        "counts" => show_counts(&pool).await?,
        "show" => {
            let id = args.get(2).expect("usage: claimqctl show <job_id>");
            let job_id: Uuid = id.parse()?;
            show_job(&pool, job_id).await?;
        }
        "purge" => {
            let days: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(7);
            let purge = PurgeRepo::new(pool.clone());
            let removed = purge
                .purge_completed_tasks(cutoff_days(days), false)
                .await?;
            println!("purged {removed} completed jobs older than {days} days");
        }
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("TRUNCATE TABLE jobs RESTART IDENTITY CASCADE")
        .execute(pool)
        .await?;

    println!("reset OK");
    Ok(())
}

async fn seed(pool: &PgPool, n: i64) -> anyhow::Result<()> {
    let repo = JobsRepo::new(pool.clone());

    for i in 0..n {
        let job_type = if i % 2 == 0 {
            "datum_import"
        } else {
            "datum_export"
        };

        let job_id = repo
            .enqueue_now(
                "demo-user",
                job_type,
                serde_json::json!({ "source": format!("seed-{i}") }),
            )
            .await?;

        println!("+ inserted job {job_type} id={job_id}");
    }
    Ok(())
}

async fn show_counts(pool: &PgPool) -> anyhow::Result<()> {
    let repo = JobsRepo::new(pool.clone());
    let counts = repo.counts_by_status().await?;

    if counts.is_empty() {
        println!("jobs: none");
        return Ok(());
    }

    let line: Vec<String> = counts.iter().map(|(s, n)| format!("{s}={n}")).collect();
    println!("jobs: {}", line.join(" "));
    Ok(())
}

async fn show_job(pool: &PgPool, job_id: Uuid) -> anyhow::Result<()> {
    let repo = JobsRepo::new(pool.clone());

    let Some(job) = repo.get_job(job_id).await? else {
        println!("job {job_id} not found");
        return Ok(());
    };

    println!(
        "JOB: id={} owner={} type={} status={} progress={:?} created_at={} claimed_at={:?} started_at={:?} completed_at={:?}",
        job.id,
        job.owner_id,
        job.job_type,
        job.status,
        job.progress_pct,
        job.created_at,
        job.claimed_at,
        job.started_at,
        job.completed_at
    );
    if let Some(result) = &job.result_json {
        println!("result: {result}");
    }
    if let Some(err) = &job.error_message {
        println!("error: {err}");
    }
    Ok(())
}
