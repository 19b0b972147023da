//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::deployer;

/// Run the preview agent until the shutdown signal resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing preview agent...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start agent: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, AgentError> {
    let (app_state, receiver) = AppState::init(options)?;
    let app_state = Arc::new(app_state);

    init_deployer_worker(
        options.deployer.clone(),
        app_state.clone(),
        receiver,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_socket_server {
        init_socket_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    Ok(app_state)
}

fn init_deployer_worker(
    options: deployer::Options,
    app_state: Arc<AppState>,
    receiver: mpsc::UnboundedReceiver<String>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing deployer worker...");

    let orchestrator = app_state.orchestrator.clone();
    let jobs = app_state.jobs.clone();

    let handle = tokio::spawn(async move {
        deployer::run(
            &options,
            orchestrator,
            jobs,
            receiver,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
        Ok::<(), AgentError>(())
    });

    shutdown_manager.register("deployer worker", handle)
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(
        app_state.orchestrator.clone(),
        app_state.queue.clone(),
        options.orchestrator.deployments_dir.clone(),
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.register("control server", server_handle)
}

// ================================= SHUTDOWN ===================================== //

type TaskHandle = JoinHandle<Result<(), AgentError>>;

/// Background tasks, joined in reverse registration order: the control server
/// stops before the deployer finishes draining its jobs.
struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    tasks: Vec<(&'static str, TaskHandle)>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            tasks: Vec::new(),
        }
    }

    fn register(&mut self, name: &'static str, handle: TaskHandle) -> Result<(), AgentError> {
        if self.tasks.iter().any(|(existing, _)| *existing == name) {
            return Err(AgentError::ShutdownError(format!("{name} handle already set")));
        }
        self.tasks.push((name, handle));
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());
        let deadline = self.lifecycle_options.max_shutdown_delay;

        match tokio::time::timeout(deadline, self.join_all()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Shutdown timed out after {:?}, aborting tasks...", deadline);
                self.abort_all().await;
                Err(AgentError::ShutdownError(format!(
                    "Shutdown timed out after {deadline:?}"
                )))
            }
        }
    }

    /// Cancel the remaining tasks; dropping their futures kills the child
    /// processes they still own.
    async fn abort_all(&mut self) {
        for (name, handle) in self.tasks.drain(..).rev() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("{} task panicked: {}", name, e);
                }
            }
            info!("Aborted {}", name);
        }
    }

    async fn join_all(&mut self) -> Result<(), AgentError> {
        info!("Shutting down preview agent...");

        let mut first_error = None;
        // Handles stay registered until joined so a timeout can still abort them
        while let Some((name, handle)) = self.tasks.last_mut() {
            let name = *name;
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AgentError::ShutdownError(format!("{name} task panicked: {e}"))),
            };
            self.tasks.pop();
            match outcome {
                Ok(()) => info!("Stopped {}", name),
                Err(e) => {
                    error!("{} stopped with error: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        info!("Shutdown complete");
        first_error.map_or(Ok(()), Err)
    }
}
