pub mod model;
pub mod repo;
pub mod worker;

pub mod purge;
pub use purge::{cutoff_days, PurgeRepo};

pub use model::{Job, JobResult, JobState, NewJob};
pub use repo::JobsRepo;
pub use worker::{BoxFuture, JobWorker, ProcessFailure, Processor};
