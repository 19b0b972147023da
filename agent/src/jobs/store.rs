//! In-memory job store

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::deploy::progress::ProgressSink;
use crate::errors::AgentError;
use crate::jobs::fsm::JobEvent;
use crate::models::job::{JobKind, JobRecord};

/// Job records keyed by id, bounded by capacity
pub struct JobStore {
    entries: RwLock<HashMap<String, JobRecord>>,
    capacity: usize,
}

impl JobStore {
    /// Create a new job store
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record a new waiting job
    pub fn create(&self, kind: JobKind) -> JobRecord {
        let job = JobRecord::new(kind);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Evict the oldest finished job if at capacity
        if entries.len() >= self.capacity {
            if let Some(oldest_id) = entries
                .values()
                .filter(|j| j.state.is_finished())
                .min_by_key(|j| j.created_at)
                .map(|j| j.id.clone())
            {
                debug!("Evicting job {}", oldest_id);
                entries.remove(&oldest_id);
            }
        }

        entries.insert(job.id.clone(), job.clone());
        job
    }

    /// Get a job by id
    pub fn get(&self, id: &str) -> Option<JobRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).cloned()
    }

    /// Most recent jobs first
    pub fn list(&self, limit: usize) -> Vec<JobRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<JobRecord> = entries.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        jobs
    }

    /// Apply a state transition to a job
    pub fn transition(&self, id: &str, event: JobEvent) -> Result<JobRecord, AgentError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let job = entries
            .get_mut(id)
            .ok_or_else(|| AgentError::NotFound(format!("Job {id}")))?;
        job.process(event)?;
        Ok(job.clone())
    }

    /// Append a progress line to a job
    pub fn append_progress(&self, id: &str, line: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = entries.get_mut(id) {
            job.progress.push(line.to_string());
        }
    }

    /// Get store size
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Progress sink writing into a job record
#[derive(Clone)]
pub struct JobProgress {
    store: Arc<JobStore>,
    job_id: String,
}

impl JobProgress {
    pub fn new(store: Arc<JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }
}

impl ProgressSink for JobProgress {
    fn append(&self, line: &str) {
        debug!(job_id = %self.job_id, "{}", line);
        self.store.append_progress(&self.job_id, line);
    }
}
