use claimq::jobs::{BoxFuture, Job, JobResult, ProcessFailure, Processor};
use serde::Deserialize;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::timeout;

type HandlerFn = dyn for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<JobResult, ProcessFailure>>
    + Send
    + Sync;

#[derive(Clone)]
pub struct JobContext {
    pub db: PgPool,
    pub worker_id: String,
}

#[derive(Clone)]
struct HandlerEntry {
    handler: Arc<HandlerFn>,
    timeout: Option<Duration>,
}

impl HandlerEntry {
    async fn run(&self, job: &Job, ctx: &JobContext) -> Result<JobResult, ProcessFailure> {
        let fut = (self.handler)(job, ctx);
        match self.timeout {
            Some(dur) => match timeout(dur, fut).await {
                Ok(inner) => inner,
                Err(_) => Err(ProcessFailure::new(
                    "TIMEOUT",
                    format!("handler timeout after {}ms", dur.as_millis()),
                )),
            },
            None => fut.await,
        }
    }
}

/// Maps job_type to a handler. This is the domain side of the queue: the
/// core hands over a claimed job and only cares about the outcome.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerEntry>,
    ctx: JobContext,
}

impl HandlerRegistry {
    pub fn new(ctx: JobContext) -> Self {
        Self {
            handlers: HashMap::new(),
            ctx,
        }
    }

    pub fn register<F>(&mut self, job_type: &str, handler: F)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<JobResult, ProcessFailure>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            job_type.to_string(),
            HandlerEntry {
                handler: Arc::new(handler),
                timeout: None,
            },
        );
    }

    /// Timeout makes the handler cancellable from the domain side; the queue
    /// core itself never kills in-flight work.
    pub fn register_with_timeout<F>(&mut self, job_type: &str, handler: F, timeout_dur: Duration)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<JobResult, ProcessFailure>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            job_type.to_string(),
            HandlerEntry {
                handler: Arc::new(handler),
                timeout: Some(timeout_dur),
            },
        );
    }
}

impl Processor for HandlerRegistry {
    fn process<'a>(&'a self, job: &'a Job) -> BoxFuture<'a, Result<JobResult, ProcessFailure>> {
        Box::pin(async move {
            match self.handlers.get(&job.job_type) {
                Some(entry) => entry.run(job, &self.ctx).await,
                None => Err(ProcessFailure::new(
                    "UNKNOWN_JOB_TYPE",
                    format!("no handler for job_type={}", job.job_type),
                )),
            }
        })
    }
}

#[derive(Deserialize)]
struct DatumImportConfig {
    source: String,
    #[serde(default)]
    records: Option<i64>,
}

#[derive(Deserialize)]
struct DatumExportConfig {
    #[serde(default)]
    format: Option<String>,
}

fn parse_config<T: for<'de> Deserialize<'de>>(job: &Job) -> Result<T, ProcessFailure> {
    serde_json::from_value(job.config_ref.clone())
        .map_err(|e| ProcessFailure::new("BAD_CONFIG", e.to_string()))
}

fn boxed<'a, T>(fut: impl std::future::Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}

pub fn build_registry(ctx: JobContext) -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new(ctx);

    // Demo handlers. Replace these with your real import/export logic.
    registry.register_with_timeout(
        "datum_import",
        |job, _ctx| {
            boxed(async move {
                let cfg: DatumImportConfig = parse_config(job)?;
                let records = cfg.records.unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(JobResult::new(
                    records,
                    format!("imported from {}", cfg.source),
                ))
            })
        },
        Duration::from_secs(3600),
    );

    registry.register_with_timeout(
        "datum_export",
        |job, _ctx| {
            boxed(async move {
                let cfg: DatumExportConfig = parse_config(job)?;
                let format = cfg.format.unwrap_or_else(|| "csv".to_string());
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(JobResult::new(0, format!("exported as {format}")))
            })
        },
        Duration::from_secs(3600),
    );

    registry.register("fail_me", |_job, _ctx| {
        boxed(async move {
            Err(ProcessFailure::new("SIMULATED", "simulated failure"))
        })
    });

    Arc::new(registry)
}
