//! Server state

use std::path::PathBuf;
use std::sync::Arc;

use crate::deploy::orchestrator::Orchestrator;
use crate::jobs::store::JobStore;
use crate::workers::deployer::JobQueue;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub queue: JobQueue,
    pub deployments_dir: PathBuf,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>, queue: JobQueue, deployments_dir: PathBuf) -> Self {
        Self {
            orchestrator,
            queue,
            deployments_dir,
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        self.queue.store()
    }
}
