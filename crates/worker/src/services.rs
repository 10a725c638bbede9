use claimq::jobs::BoxFuture;
use claimq::maintenance::{Maintainable, MaintenanceParams, RegisteredService};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

fn param_secs(params: &MaintenanceParams, key: &str, default_secs: u64) -> Duration {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(default_secs))
}

/// In-memory lookup cache with TTL-based eviction on maintenance ticks.
pub struct LookupCacheService {
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl LookupCacheService {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (Instant::now(), value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|(_, v)| v.clone())
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    fn prune(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, (inserted, _)| inserted.elapsed() < ttl);
        before - entries.len()
    }
}

impl RegisteredService for LookupCacheService {
    fn service_name(&self) -> &str {
        "lookup-cache"
    }

    fn as_maintainable(&self) -> Option<&dyn Maintainable> {
        Some(self)
    }
}

impl Maintainable for LookupCacheService {
    fn perform_maintenance<'a>(
        &'a self,
        params: &'a MaintenanceParams,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let ttl = param_secs(params, "cache_ttl_secs", 600);
            let pruned = self.prune(ttl);
            if pruned > 0 {
                tracing::info!(pruned, "lookup cache pruned");
            }
            Ok(())
        })
    }
}

/// Tracks last-seen times per session and drops stale ones on maintenance.
pub struct SessionRegistryService {
    sessions: Mutex<HashMap<String, Instant>>,
}

impl SessionRegistryService {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn touch(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session_id.to_string(), Instant::now());
    }

    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }

    fn drop_stale(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, last_seen| last_seen.elapsed() < max_idle);
        before - sessions.len()
    }
}

impl RegisteredService for SessionRegistryService {
    fn service_name(&self) -> &str {
        "session-registry"
    }

    fn as_maintainable(&self) -> Option<&dyn Maintainable> {
        Some(self)
    }
}

impl Maintainable for SessionRegistryService {
    fn perform_maintenance<'a>(
        &'a self,
        params: &'a MaintenanceParams,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let max_idle = param_secs(params, "session_max_idle_secs", 1800);
            let dropped = self.drop_stale(max_idle);
            if dropped > 0 {
                tracing::info!(dropped, "stale sessions removed");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_prune_removes_only_expired_entries() {
        let cache = LookupCacheService::new();
        cache.put("a", "1");
        cache.put("b", "2");

        // Zero TTL expires everything inserted before the tick.
        let mut params = MaintenanceParams::new();
        params.insert("cache_ttl_secs".to_string(), "0".to_string());
        cache.perform_maintenance(&params).await.unwrap();
        assert_eq!(cache.len(), 0);

        cache.put("c", "3");
        params.insert("cache_ttl_secs".to_string(), "600".to_string());
        cache.perform_maintenance(&params).await.unwrap();
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn stale_sessions_are_dropped() {
        let registry = SessionRegistryService::new();
        registry.touch("s1");
        registry.touch("s2");
        assert_eq!(registry.active_count(), 2);

        let mut params = MaintenanceParams::new();
        params.insert("session_max_idle_secs".to_string(), "0".to_string());
        registry.perform_maintenance(&params).await.unwrap();
        assert_eq!(registry.active_count(), 0);
    }
}
