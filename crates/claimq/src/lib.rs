pub mod config;
pub mod db;
pub mod introspect;
pub mod jobs;
pub mod maintenance;
pub mod runner;

pub use config::Config;
pub use introspect::{JobFilter, JobInfo, SchedulerRegistry};
pub use jobs::{Job, JobState, JobsRepo, NewJob, PurgeRepo};
pub use maintenance::{MaintenanceDispatcher, Maintainable, RegisteredService, ServiceRegistry};
pub use runner::{LogObserver, PeriodicTask, TaskId, TickObserver};
