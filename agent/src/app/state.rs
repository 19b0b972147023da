//! Application state management

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::process::SystemRunner;
use crate::deploy::routes::CaddyRoutes;
use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::jobs::store::JobStore;
use crate::workers::deployer::JobQueue;

/// Main application state
pub struct AppState {
    /// Deployment orchestrator
    pub orchestrator: Arc<Orchestrator>,

    /// Job records
    pub jobs: Arc<JobStore>,

    /// Queue feeding the deployer worker
    pub queue: JobQueue,
}

impl AppState {
    /// Initialize application state, returning the receiver for the deployer worker
    pub fn init(
        options: &AppOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), AgentError> {
        info!("Initializing application state...");

        let orchestrator = Arc::new(build_orchestrator(options)?);

        let jobs = Arc::new(JobStore::new(options.job_history));
        let (queue, receiver) = JobQueue::new(jobs.clone());

        Ok((
            Self {
                orchestrator,
                jobs,
                queue,
            },
            receiver,
        ))
    }
}

/// Orchestrator running real processes against the Caddy admin API
pub fn build_orchestrator(options: &AppOptions) -> Result<Orchestrator, AgentError> {
    let admin = HttpClient::new(&options.proxy.admin_url)?;
    let routes = CaddyRoutes::new(
        admin,
        options.proxy.server.clone(),
        options.proxy.domain.clone(),
    );
    Ok(Orchestrator::new(
        options.orchestrator.clone(),
        Arc::new(SystemRunner::new()),
        Arc::new(routes),
    ))
}
