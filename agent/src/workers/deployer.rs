//! Deployment worker: executes queued jobs, one at a time per branch

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::deploy::orchestrator::Orchestrator;
use crate::errors::AgentError;
use crate::jobs::fsm::JobEvent;
use crate::jobs::store::{JobProgress, JobStore};
use crate::models::deployment::branch_handle;
use crate::models::job::{JobKind, JobRecord};

/// Error recorded on jobs the worker gives up on while stopping
pub const SHUTDOWN_REASON: &str = "Agent shut down before the job started";

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Deadline for a single job; the job's processes are killed when it passes
    pub job_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            job_timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Handle used to enqueue jobs for the worker
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<JobStore>,
    sender: mpsc::UnboundedSender<String>,
}

impl JobQueue {
    /// Create a queue and the receiver the worker consumes
    pub fn new(store: Arc<JobStore>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { store, sender }, receiver)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Record a job and schedule it for execution
    pub fn perform_later(&self, kind: JobKind) -> Result<JobRecord, AgentError> {
        let job = self.store.create(kind);
        info!("Queued job {} ({})", job.id, job.name);
        self.enqueue(&job.id)?;
        Ok(job)
    }

    /// Re-queue a failed job
    pub fn retry(&self, job_id: &str) -> Result<JobRecord, AgentError> {
        let job = self.store.transition(job_id, JobEvent::Retry)?;
        info!("Re-queued job {} ({})", job.id, job.name);
        self.enqueue(job_id)?;
        Ok(job)
    }

    /// Hand a waiting job to the worker; the job fails if no worker is left
    fn enqueue(&self, job_id: &str) -> Result<(), AgentError> {
        if self.sender.send(job_id.to_string()).is_ok() {
            return Ok(());
        }
        abandon(&self.store, job_id);
        Err(AgentError::JobError("Deployer worker is not running".to_string()))
    }
}

/// Per-branch locks guaranteeing at most one in-flight job per branch
#[derive(Default)]
struct BranchLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BranchLocks {
    fn lock_for(&self, handle: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(handle.to_string()).or_default().clone()
    }

    /// Give back a lock from `lock_for`; the entry goes away with its last user
    fn release(&self, handle: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        if locks
            .get(handle)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(handle);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Run the deployer worker
pub async fn run(
    options: &Options,
    orchestrator: Arc<Orchestrator>,
    store: Arc<JobStore>,
    mut receiver: mpsc::UnboundedReceiver<String>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Deployer worker starting...");

    let locks = Arc::new(BranchLocks::default());
    let stopping = Arc::new(AtomicBool::new(false));
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                break;
            }
            received = receiver.recv() => match received {
                Some(job_id) => {
                    let options = options.clone();
                    let orchestrator = orchestrator.clone();
                    let store = store.clone();
                    let locks = locks.clone();
                    let stopping = stopping.clone();
                    in_flight.spawn(async move {
                        execute_job(&options, &orchestrator, store, &locks, &stopping, job_id)
                            .await;
                    });
                }
                None => {
                    info!("Job queue closed, deployer worker stopping...");
                    break;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!("Job task panicked: {}", e);
                }
            }
        }
    }

    // Jobs still queued or waiting on a branch lock will not start
    stopping.store(true, Ordering::SeqCst);
    receiver.close();
    while let Ok(job_id) = receiver.try_recv() {
        abandon(&store, &job_id);
    }

    if !in_flight.is_empty() {
        info!("Waiting for {} in-flight job(s)...", in_flight.len());
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Job task panicked: {}", e);
        }
    }
}

fn abandon(store: &JobStore, job_id: &str) {
    match store.transition(job_id, JobEvent::Abandon(SHUTDOWN_REASON.to_string())) {
        Ok(_) => warn!("Job {} was not started: {}", job_id, SHUTDOWN_REASON),
        Err(e) => error!("Unable to mark job {} as failed: {}", job_id, e),
    }
}

async fn execute_job(
    options: &Options,
    orchestrator: &Orchestrator,
    store: Arc<JobStore>,
    locks: &BranchLocks,
    stopping: &AtomicBool,
    job_id: String,
) {
    let Some(job) = store.get(&job_id) else {
        warn!("Job {} vanished before it could run", job_id);
        return;
    };

    let handle = branch_handle(job.kind.branch());
    let lock = locks.lock_for(&handle);
    {
        let _guard = lock.lock().await;
        if stopping.load(Ordering::SeqCst) {
            abandon(&store, &job_id);
        } else {
            run_job(options, orchestrator, store, job).await;
        }
    }
    locks.release(&handle, lock);
    debug!("Released branch lock for job {}", job_id);
}

async fn run_job(
    options: &Options,
    orchestrator: &Orchestrator,
    store: Arc<JobStore>,
    job: JobRecord,
) {
    let job_id = job.id.clone();
    if let Err(e) = store.transition(&job_id, JobEvent::Start) {
        error!("Unable to start job {}: {}", job_id, e);
        return;
    }
    info!("Running job {} ({})", job_id, job.name);

    let sink = JobProgress::new(store.clone(), job_id.clone());
    let work = perform(orchestrator, &job.kind, &sink);
    let outcome = match options.job_timeout {
        Some(deadline) => match tokio::time::timeout(deadline, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::Timeout(format!(
                "job {} exceeded {:?}",
                job_id, deadline
            ))),
        },
        None => work.await,
    };

    let event = match outcome {
        Ok((result, summary)) => {
            info!("Job {} completed: {}", job_id, result);
            JobEvent::Complete {
                result,
                summary: Some(summary),
            }
        }
        Err(e) => {
            error!("Job {} failed: {}", job_id, e);
            JobEvent::Fail(e.to_string())
        }
    };
    if let Err(e) = store.transition(&job_id, event) {
        error!("Unable to record outcome of job {}: {}", job_id, e);
    }
}

async fn perform(
    orchestrator: &Orchestrator,
    kind: &JobKind,
    sink: &JobProgress,
) -> Result<(String, serde_json::Value), AgentError> {
    match kind {
        JobKind::Deploy(request) => {
            let summary = orchestrator.deploy(request, sink).await?;
            Ok((
                format!("Deployed branch \"{}\"", request.branch),
                serde_json::to_value(summary)?,
            ))
        }
        JobKind::Destroy(request) => {
            let summary = orchestrator.destroy(request, sink).await?;
            Ok((
                format!("Removed deployment for branch \"{}\"", request.branch),
                serde_json::to_value(summary)?,
            ))
        }
    }
}
