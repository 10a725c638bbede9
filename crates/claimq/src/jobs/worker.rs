use crate::jobs::model::{Job, JobResult};
use crate::jobs::repo::JobsRepo;
use std::{future::Future, pin::Pin, sync::Arc};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure signalled by the domain collaborator for one job.
#[derive(Debug)]
pub struct ProcessFailure {
    pub code: &'static str,
    pub message: String,
}

impl ProcessFailure {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The domain processing collaborator. The queue core treats this as an
/// opaque call: it decides nothing about what the work means, only that
/// exactly one worker runs it and where the outcome lands.
pub trait Processor: Send + Sync {
    fn process<'a>(&'a self, job: &'a Job) -> BoxFuture<'a, Result<JobResult, ProcessFailure>>;
}

/// One claim-and-process cycle over the shared store.
#[derive(Clone)]
pub struct JobWorker {
    repo: JobsRepo,
    processor: Arc<dyn Processor>,
}

impl JobWorker {
    pub fn new(repo: JobsRepo, processor: Arc<dyn Processor>) -> Self {
        Self { repo, processor }
    }

    /// Claim at most one queued job and drive it to a terminal state.
    /// Returns whether a job was claimed this cycle.
    pub async fn run_once(&self) -> anyhow::Result<bool> {
        let Some(job) = self.repo.claim_queued_task().await? else {
            return Ok(false);
        };

        // claimed -> executing before the collaborator runs, so introspection
        // can tell executing jobs apart from claimed-but-not-started ones.
        if !self.repo.mark_executing(job.id).await? {
            tracing::warn!(job_id = %job.id, "claimed job no longer in claimed state, skipping");
            return Ok(true);
        }

        match self.processor.process(&job).await {
            Ok(result) => {
                self.repo.mark_completed(job.id, &result).await?;
                tracing::info!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    items = result.items_processed,
                    "job completed"
                );
            }
            Err(failure) => {
                self.repo
                    .mark_error(job.id, &failure.to_string(), None)
                    .await?;
                tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    code = failure.code,
                    "job failed"
                );
            }
        }

        Ok(true)
    }
}
