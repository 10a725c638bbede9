/// Runtime configuration, loaded from environment variables once at startup.
/// Missing required values fail here, before any periodic loop starts.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub worker_id: String,
    pub migrate_on_startup: bool,

    pub claim_interval_ms: u64,
    pub purge_interval_secs: u64,
    pub maintenance_interval_secs: u64,

    /// Ceiling after which a still-running tick is flagged as overdue.
    pub tick_max_wait_secs: u64,

    pub retain_completed_days: i64,
    pub purge_include_error: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let worker_id = env_or_fallback("CLAIMQ_WORKER_ID", "WORKER_ID")
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "worker-1".to_string());

        let migrate_on_startup = env_bool("CLAIMQ_MIGRATE_ON_STARTUP").unwrap_or(false);

        let claim_interval_ms = env_or_fallback("CLAIMQ_CLAIM_INTERVAL_MS", "CLAIM_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let purge_interval_secs =
            env_or_fallback("CLAIMQ_PURGE_INTERVAL_SECS", "PURGE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600);

        let maintenance_interval_secs =
            env_or_fallback("CLAIMQ_MAINTENANCE_INTERVAL_SECS", "MAINTENANCE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

        let tick_max_wait_secs = env_or_fallback("CLAIMQ_TICK_MAX_WAIT_SECS", "TICK_MAX_WAIT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let retain_completed_days =
            env_or_fallback("CLAIMQ_RETAIN_COMPLETED_DAYS", "RETAIN_COMPLETED_DAYS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(7);

        let purge_include_error = env_bool("CLAIMQ_PURGE_INCLUDE_ERROR").unwrap_or(false);

        Ok(Self {
            database_url,
            worker_id,
            migrate_on_startup,
            claim_interval_ms,
            purge_interval_secs,
            maintenance_interval_secs,
            tick_max_wait_secs,
            retain_completed_days,
            purge_include_error,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
