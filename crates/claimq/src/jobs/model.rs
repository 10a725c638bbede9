use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: String,
    pub job_type: String,
    pub config_ref: Value,
    pub status: String,
    pub progress_pct: Option<i32>,

    pub result_json: Option<Value>,
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Parsed view of the raw status column.
    pub fn state(&self) -> Option<JobState> {
        JobState::parse(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state(), Some(s) if s.is_terminal())
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: String,
    pub job_type: String,
    pub config_ref: Value,
}

/// Lifecycle of a job row.
///
/// `queued -> claimed` happens only through the claim protocol;
/// `claimed -> executing -> {completed|error}` is linear. Terminal rows are
/// immutable except for deletion by the retention purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Claimed,
    Executing,
    Completed,
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Claimed => "claimed",
            JobState::Executing => "executing",
            JobState::Completed => "completed",
            JobState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobState::Queued),
            "claimed" => Some(JobState::Claimed),
            "executing" => Some(JobState::Executing),
            "completed" => Some(JobState::Completed),
            "error" => Some(JobState::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }
}

/// Structured outcome attached when a job reaches a terminal state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub items_processed: i64,
    pub message: Option<String>,
}

impl JobResult {
    pub fn new(items_processed: i64, message: impl Into<String>) -> Self {
        Self {
            items_processed,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_str() {
        for s in [
            JobState::Queued,
            JobState::Claimed,
            JobState::Executing,
            JobState::Completed,
            JobState::Error,
        ] {
            assert_eq!(JobState::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobState::parse("running"), None);
    }

    #[test]
    fn terminal_states_are_completed_and_error() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Claimed.is_terminal());
        assert!(!JobState::Executing.is_terminal());
    }
}
