use crate::jobs::worker::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type MaintenanceParams = HashMap<String, String>;

/// Self-upkeep capability a registered service may expose: cache pruning,
/// stale-session cleanup, and the like.
pub trait Maintainable: Send + Sync {
    fn perform_maintenance<'a>(
        &'a self,
        params: &'a MaintenanceParams,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Base trait for anything held in the service registry. Maintenance
/// capability is discovered per service per tick through `as_maintainable`,
/// never by static registration, so services added or removed between ticks
/// are picked up naturally.
pub trait RegisteredService: Send + Sync {
    fn service_name(&self) -> &str;

    fn as_maintainable(&self) -> Option<&dyn Maintainable> {
        None
    }
}

/// Externally owned, dynamically sized collection of services.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<RwLock<Vec<Arc<dyn RegisteredService>>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, service: Arc<dyn RegisteredService>) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.push(service);
    }

    pub fn remove(&self, name: &str) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.retain(|s| s.service_name() != name);
    }

    pub fn current(&self) -> Vec<Arc<dyn RegisteredService>> {
        let services = self.services.read().unwrap_or_else(|e| e.into_inner());
        services.clone()
    }
}

/// Invokes every maintenance-capable service once per tick, isolating
/// failures per service.
#[derive(Clone)]
pub struct MaintenanceDispatcher {
    registry: ServiceRegistry,
    params: MaintenanceParams,
}

impl MaintenanceDispatcher {
    pub fn new(registry: ServiceRegistry, params: MaintenanceParams) -> Self {
        Self { registry, params }
    }

    /// One dispatch tick. Returns (succeeded, failed) counts. A failing
    /// service is logged and never prevents the rest from running.
    pub async fn run_once(&self) -> (usize, usize) {
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for service in self.registry.current() {
            let Some(maintainable) = service.as_maintainable() else {
                continue;
            };

            match maintainable.perform_maintenance(&self.params).await {
                Ok(()) => {
                    succeeded += 1;
                    tracing::debug!(service = service.service_name(), "maintenance ok");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        service = service.service_name(),
                        error = %e,
                        "maintenance failed"
                    );
                }
            }
        }

        (succeeded, failed)
    }
}
