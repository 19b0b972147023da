//! Job models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::deployment::{DeployRequest, DestroyRequest};

/// Work a job performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobKind {
    Deploy(DeployRequest),
    Destroy(DestroyRequest),
}

impl JobKind {
    /// Branch the job operates on
    pub fn branch(&self) -> &str {
        match self {
            JobKind::Deploy(request) => &request.branch,
            JobKind::Destroy(request) => &request.branch,
        }
    }

    /// Human readable job name
    pub fn job_name(&self) -> String {
        match self {
            JobKind::Deploy(request) => format!("Deploy branch {}", request.branch),
            JobKind::Destroy(request) => {
                format!("Remove deployment for branch \"{}\"", request.branch)
            }
        }
    }
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Queued, not yet picked up
    Waiting,

    /// Being executed
    Active,

    /// Finished successfully
    Completed,

    /// Finished with an error
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A queued or executed orchestration run with its progress log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub kind: JobKind,
    pub state: JobState,

    /// Number of times the job has been started
    pub attempts: u32,

    /// Progress lines of the current attempt
    pub progress: Vec<String>,

    /// Result message on success
    pub result: Option<String>,

    /// Orchestrator summary on success
    pub summary: Option<serde_json::Value>,

    /// Error message on failure
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// New job in the waiting state
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: kind.job_name(),
            kind,
            state: JobState::Waiting,
            attempts: 0,
            progress: Vec::new(),
            result: None,
            summary: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
