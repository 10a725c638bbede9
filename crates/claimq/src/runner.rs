use crate::introspect::SchedulerRegistry;
use crate::jobs::worker::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Stable identity of one periodic task, used to correlate log output and
/// introspection with a specific runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskId {
    pub group: String,
    pub id: String,
}

impl TaskId {
    pub fn new(group: &str, id: &str) -> Self {
        Self {
            group: group.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.id)
    }
}

/// Observability collaborator for tick execution signals.
pub trait TickObserver: Send + Sync {
    fn on_start(&self, task: &TaskId);
    fn on_success(&self, task: &TaskId, elapsed: Duration);
    fn on_failure(&self, task: &TaskId, elapsed: Duration, error: &anyhow::Error);
    /// The run exceeded its max-wait budget. Advisory only; the work is
    /// never forcibly terminated.
    fn on_overdue(&self, task: &TaskId, budget: Duration);
}

/// Default observer: structured log events per signal.
pub struct LogObserver;

impl TickObserver for LogObserver {
    fn on_start(&self, task: &TaskId) {
        tracing::debug!(task = %task, "tick start");
    }

    fn on_success(&self, task: &TaskId, elapsed: Duration) {
        tracing::debug!(task = %task, elapsed_ms = elapsed.as_millis() as u64, "tick ok");
    }

    fn on_failure(&self, task: &TaskId, elapsed: Duration, error: &anyhow::Error) {
        tracing::warn!(
            task = %task,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "tick failed"
        );
    }

    fn on_overdue(&self, task: &TaskId, budget: Duration) {
        tracing::warn!(
            task = %task,
            budget_ms = budget.as_millis() as u64,
            "tick overdue, still running"
        );
    }
}

type Work = dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Wraps one recurring unit of work with single-flight execution, a max-wait
/// ceiling, and execution signals.
///
/// A tick that lands while the previous run of the same task is still in
/// flight is skipped, not queued: the loop awaits each run to completion and
/// the interval discards missed ticks. Failures from the wrapped work are
/// reported and swallowed so one bad tick never halts future ticks.
pub struct PeriodicTask {
    id: TaskId,
    interval: Duration,
    max_wait: Duration,
    observer: Arc<dyn TickObserver>,
    work: Arc<Work>,
}

impl PeriodicTask {
    pub fn new<F>(group: &str, id: &str, interval: Duration, max_wait: Duration, work: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        Self {
            id: TaskId::new(group, id),
            interval,
            max_wait,
            observer: Arc::new(LogObserver),
            work: Arc::new(work),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TickObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn task_id(&self) -> &TaskId {
        &self.id
    }

    /// Start the tick loop, registering this task for introspection.
    pub fn spawn(self, registry: &SchedulerRegistry) -> JoinHandle<()> {
        let executing = Arc::new(AtomicBool::new(false));
        registry.register(&self.id.group, &self.id.id, executing.clone());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                executing.store(true, Ordering::SeqCst);
                self.run_tick().await;
                executing.store(false, Ordering::SeqCst);
            }
        })
    }

    async fn run_tick(&self) {
        self.observer.on_start(&self.id);
        let started = Instant::now();

        let fut = (self.work)();
        tokio::pin!(fut);

        let result = tokio::select! {
            res = &mut fut => res,
            _ = tokio::time::sleep(self.max_wait) => {
                self.observer.on_overdue(&self.id, self.max_wait);
                // Keep waiting; the ceiling is observability, not pre-emption.
                fut.await
            }
        };

        let elapsed = started.elapsed();
        match result {
            Ok(()) => self.observer.on_success(&self.id, elapsed),
            Err(e) => self.observer.on_failure(&self.id, elapsed, &e),
        }
    }
}
