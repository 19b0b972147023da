//! Finite state machine for job records

use chrono::Utc;

use crate::errors::AgentError;
use crate::models::job::{JobRecord, JobState};

/// Job event
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Worker picked the job up
    Start,

    /// Job finished successfully
    Complete {
        result: String,
        summary: Option<serde_json::Value>,
    },

    /// Job finished with an error
    Fail(String),

    /// Give up on a job that never started
    Abandon(String),

    /// Re-queue a failed job
    Retry,
}

impl JobRecord {
    /// Process an event and transition state
    pub fn process(&mut self, event: JobEvent) -> Result<(), AgentError> {
        let new_state = match (self.state, event) {
            // From Waiting
            (JobState::Waiting, JobEvent::Start) => {
                self.attempts += 1;
                self.progress.clear();
                self.error = None;
                self.started_at = Some(Utc::now());
                self.finished_at = None;
                JobState::Active
            }
            (JobState::Waiting, JobEvent::Abandon(reason)) => {
                self.error = Some(reason);
                self.finished_at = Some(Utc::now());
                JobState::Failed
            }

            // From Active
            (JobState::Active, JobEvent::Complete { result, summary }) => {
                self.result = Some(result);
                self.summary = summary;
                self.finished_at = Some(Utc::now());
                JobState::Completed
            }
            (JobState::Active, JobEvent::Fail(err)) => {
                self.error = Some(err);
                self.finished_at = Some(Utc::now());
                JobState::Failed
            }

            // From Failed
            (JobState::Failed, JobEvent::Retry) => JobState::Waiting,

            // Invalid transitions
            (state, event) => {
                return Err(AgentError::JobError(format!(
                    "Invalid transition for job {}: {:?} -> {:?}",
                    self.id, state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }
}
