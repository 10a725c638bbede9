use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Point-in-time projection of one periodic task known to the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub group: String,
    pub executing: bool,
}

/// Pure predicate over [`JobInfo`] projections. Absent fields are wildcards;
/// present fields must match exactly, case-insensitively for strings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub id: Option<String>,
    pub group: Option<String>,
    pub executing: Option<bool>,
}

impl JobFilter {
    pub fn matches(&self, info: &JobInfo) -> bool {
        if let Some(id) = &self.id {
            if !id.eq_ignore_ascii_case(&info.id) {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if !group.eq_ignore_ascii_case(&info.group) {
                return false;
            }
        }
        if let Some(executing) = self.executing {
            if executing != info.executing {
                return false;
            }
        }
        true
    }
}

struct RegisteredTask {
    id: String,
    group: String,
    executing: Arc<AtomicBool>,
}

/// Read-side registry of the periodic tasks running in this process.
/// Runners register on spawn; snapshots are taken per query.
#[derive(Clone, Default)]
pub struct SchedulerRegistry {
    inner: Arc<Mutex<Vec<RegisteredTask>>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, group: &str, id: &str, executing: Arc<AtomicBool>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.push(RegisteredTask {
            id: id.to_string(),
            group: group.to_string(),
            executing,
        });
    }

    pub fn snapshot(&self) -> Vec<JobInfo> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .iter()
            .map(|t| JobInfo {
                id: t.id.clone(),
                group: t.group.clone(),
                executing: t.executing.load(Ordering::SeqCst),
            })
            .collect()
    }

    pub fn find(&self, filter: &JobFilter) -> Vec<JobInfo> {
        self.snapshot()
            .into_iter()
            .filter(|info| filter.matches(info))
            .collect()
    }
}
