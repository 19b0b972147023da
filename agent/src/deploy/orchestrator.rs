//! Deployment orchestrator
//!
//! Drives a branch between the two externally visible states, *absent* and
//! *present*. Every step is idempotent or checks before acting, so a failed
//! run is repaired by running it again; nothing is rolled back.
//!
//! Same-branch runs must be serialized by the caller.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::interpreter::{ExecutionPolicy, Interpreter};
use crate::deploy::ports::ensure_port;
use crate::deploy::process::CommandRunner;
use crate::deploy::program::{self, log, Program};
use crate::deploy::progress::ProgressSink;
use crate::deploy::registry::DeploymentRegistry;
use crate::deploy::routes::RouteRegistry;
use crate::errors::AgentError;
use crate::models::deployment::{
    BranchHandle, DeployAction, DeployRequest, DeploySummary, DestroyRequest, DestroySummary,
    RouteStatus,
};

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Directory holding one checkout per branch handle
    pub deployments_dir: PathBuf,

    /// Container CLI binary (`docker compose ...`)
    pub container_cli: String,

    /// Run `system prune` before deploys and after destroys
    pub prune: bool,

    /// Execution policy for composite programs
    pub execution: ExecutionPolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            deployments_dir: PathBuf::from("deployments"),
            container_cli: "docker".to_string(),
            prune: true,
            execution: ExecutionPolicy::Sequential,
        }
    }
}

/// Creates, updates and destroys branch deployments
pub struct Orchestrator {
    options: OrchestratorOptions,
    registry: DeploymentRegistry,
    interpreter: Interpreter,
    routes: Arc<dyn RouteRegistry>,
}

impl Orchestrator {
    pub fn new(
        options: OrchestratorOptions,
        runner: Arc<dyn CommandRunner>,
        routes: Arc<dyn RouteRegistry>,
    ) -> Self {
        let registry = DeploymentRegistry::new(&options.deployments_dir);
        let interpreter = Interpreter::new(runner, options.execution);
        Self {
            options,
            registry,
            interpreter,
            routes,
        }
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    /// Handles of all existing deployments
    pub async fn list(&self) -> BTreeSet<String> {
        self.registry.list().await
    }

    /// Create the deployment for a branch, or update it in place if it exists
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DeploySummary, AgentError> {
        let (handle, root_directory) = request.validate()?;
        info!("Deploying branch {} ({})", request.branch, handle);

        let checkout_dir = self.registry.directory(&handle);
        let compose_dir = self
            .registry
            .compose_directory(&handle, root_directory.as_deref());
        let cli = self.options.container_cli.as_str();

        self.prune(sink).await?;

        let action = if self.registry.exists(&request.branch).await {
            sink.append(&format!(
                "Deployment for branch \"{}\" already exists. Pulling latest changes to update.",
                request.branch
            ));
            self.interpreter
                .execute(&program::pull_latest(checkout_dir.path()), sink)
                .await?;
            DeployAction::Updated
        } else {
            sink.append(&format!(
                "Creating deployment assets for branch \"{}\".",
                request.branch
            ));
            self.registry.root().create().await?;
            let clone = program::clone_repo(
                &request.branch,
                request.clone_url.trim(),
                handle.as_str(),
                self.registry.root().path(),
            );
            self.interpreter.execute(&clone, sink).await?;
            DeployAction::Created
        };

        let host_port = ensure_port(&compose_dir).await?;
        sink.append(&format!("Using host port {host_port}."));

        let mut containers = Vec::new();
        if action == DeployAction::Updated {
            containers.push(log("Building images.."));
            containers.push(program::compose_build(cli, compose_dir.path()));
        }
        containers.push(log("Starting deployment.."));
        containers.push(program::compose_up(cli, compose_dir.path()));
        self.interpreter
            .execute(&Program::sequence(containers), sink)
            .await?;

        let mut warnings = Vec::new();
        let route = self
            .ensure_route(&handle, host_port, sink, &mut warnings)
            .await;

        let summary = DeploySummary {
            branch: request.branch.clone(),
            url: self.routes.url_for(handle.as_str()),
            branch_handle: handle,
            action,
            host_port,
            route,
            warnings,
        };
        info!(
            "Deployed branch {} on port {} ({:?})",
            summary.branch, summary.host_port, summary.action
        );
        Ok(summary)
    }

    /// Tear down the deployment for a branch
    pub async fn destroy(
        &self,
        request: &DestroyRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DestroySummary, AgentError> {
        let (handle, root_directory) = request.validate()?;

        if !self.registry.exists(&request.branch).await {
            return Err(AgentError::NotFound(format!(
                "No deployment found for branch \"{}\"",
                request.branch
            )));
        }
        info!("Destroying deployment for branch {} ({})", request.branch, handle);

        let route_removed = if self.has_route(&handle, sink).await {
            sink.append("Removing domain from deployment..");
            self.routes.remove_route(handle.as_str()).await?;
            true
        } else {
            false
        };

        let compose_dir = self
            .registry
            .compose_directory(&handle, root_directory.as_deref());
        let stop = Program::sequence([
            log("Stopping deployment.."),
            program::compose_down(&self.options.container_cli, compose_dir.path()),
        ]);
        self.interpreter.execute(&stop, sink).await?;

        self.prune(sink).await?;

        sink.append("Destroying deployment assets..");
        self.registry.remove(&handle).await?;

        Ok(DestroySummary {
            branch: request.branch.clone(),
            branch_handle: handle,
            route_removed,
        })
    }

    async fn prune(&self, sink: &dyn ProgressSink) -> Result<(), AgentError> {
        if !self.options.prune {
            return Ok(());
        }
        let prune = Program::sequence([
            log("Pruning unused container resources.."),
            program::system_prune(&self.options.container_cli),
        ]);
        self.interpreter.execute(&prune, sink).await
    }

    /// Route lookup where an unreachable proxy counts as "no route"
    async fn has_route(&self, handle: &BranchHandle, sink: &dyn ProgressSink) -> bool {
        match self.routes.has_route(handle.as_str()).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Route lookup for {} failed, assuming absent: {}", handle, e);
                sink.append(&format!("warning: route lookup failed, assuming absent: {e}"));
                false
            }
        }
    }

    async fn ensure_route(
        &self,
        handle: &BranchHandle,
        port: u16,
        sink: &dyn ProgressSink,
        warnings: &mut Vec<String>,
    ) -> RouteStatus {
        if self.has_route(handle, sink).await {
            return RouteStatus::AlreadyPresent;
        }

        sink.append("Assigning domain to deployment..");
        match self.routes.add_route(handle.as_str(), port).await {
            Ok(()) => RouteStatus::Registered,
            Err(e) => {
                let message = format!("route for {handle} could not be registered: {e}");
                warn!("{}", message);
                sink.append(&format!("warning: {message}"));
                warnings.push(message);
                RouteStatus::Failed
            }
        }
    }
}

