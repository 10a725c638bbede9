use claimq::config::Config;
use claimq::db;
use claimq::introspect::SchedulerRegistry;
use claimq::jobs::{cutoff_days, JobWorker, JobsRepo, PurgeRepo};
use claimq::maintenance::{MaintenanceDispatcher, MaintenanceParams, ServiceRegistry};
use claimq::runner::PeriodicTask;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod handlers;
mod services;

use handlers::{build_registry, JobContext};
use services::{LookupCacheService, SessionRegistryService};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = Config::from_env()?;

    tracing::info!(
        worker_id = %cfg.worker_id,
        claim_interval_ms = cfg.claim_interval_ms,
        purge_interval_secs = cfg.purge_interval_secs,
        maintenance_interval_secs = cfg.maintenance_interval_secs,
        retain_completed_days = cfg.retain_completed_days,
        purge_include_error = cfg.purge_include_error,
        migrate_on_startup = cfg.migrate_on_startup,
        "claimq worker starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let jobs_repo = JobsRepo::new(pool.clone());
    let purge_repo = PurgeRepo::new(pool.clone());

    let registry = build_registry(JobContext {
        db: pool.clone(),
        worker_id: cfg.worker_id.clone(),
    });
    let job_worker = JobWorker::new(jobs_repo.clone(), registry);

    // Maintenance-capable services; the collection may grow or shrink while
    // the dispatcher runs, it re-reads it every tick.
    let service_registry = ServiceRegistry::new();
    service_registry.add(Arc::new(LookupCacheService::new()));
    service_registry.add(Arc::new(SessionRegistryService::new()));

    let mut maintenance_params = MaintenanceParams::new();
    maintenance_params.insert("cache_ttl_secs".to_string(), "600".to_string());
    maintenance_params.insert("session_max_idle_secs".to_string(), "1800".to_string());
    let dispatcher = MaintenanceDispatcher::new(service_registry.clone(), maintenance_params);

    let scheduler = SchedulerRegistry::new();
    let max_wait = Duration::from_secs(cfg.tick_max_wait_secs);

    // ---- Claim-and-process loop ----
    let claim_worker = job_worker.clone();
    let claim_handle = PeriodicTask::new(
        "jobs",
        "claim",
        Duration::from_millis(cfg.claim_interval_ms),
        max_wait,
        move || {
            let worker = claim_worker.clone();
            Box::pin(async move {
                worker.run_once().await?;
                Ok(())
            })
        },
    )
    .spawn(&scheduler);

    // ---- Retention purge loop ----
    let purge = purge_repo.clone();
    let retain_days = cfg.retain_completed_days;
    let include_error = cfg.purge_include_error;
    let purge_handle = PeriodicTask::new(
        "jobs",
        "purge",
        Duration::from_secs(cfg.purge_interval_secs),
        max_wait,
        move || {
            let purge = purge.clone();
            Box::pin(async move {
                let removed = purge
                    .purge_completed_tasks(cutoff_days(retain_days), include_error)
                    .await?;
                if removed > 0 {
                    tracing::info!(removed, "purged terminal jobs");
                }
                Ok(())
            })
        },
    )
    .spawn(&scheduler);

    // ---- Maintenance dispatch loop ----
    let dispatch = dispatcher.clone();
    let maintenance_handle = PeriodicTask::new(
        "maintenance",
        "dispatch",
        Duration::from_secs(cfg.maintenance_interval_secs),
        max_wait,
        move || {
            let dispatch = dispatch.clone();
            Box::pin(async move {
                let (succeeded, failed) = dispatch.run_once().await;
                tracing::debug!(succeeded, failed, "maintenance dispatch done");
                Ok(())
            })
        },
    )
    .spawn(&scheduler);

    for info in scheduler.snapshot() {
        tracing::info!(group = %info.group, id = %info.id, "periodic task registered");
    }

    tokio::select! {
        res = claim_handle => res?,
        res = purge_handle => res?,
        res = maintenance_handle => res?,
    }

    Ok(())
}
