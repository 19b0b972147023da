//! Application configuration options

use std::time::Duration;

use crate::deploy::orchestrator::OrchestratorOptions;
use crate::storage::settings::Settings;
use crate::workers::deployer;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Orchestrator configuration
    pub orchestrator: OrchestratorOptions,

    /// Reverse proxy configuration
    pub proxy: ProxyOptions,

    /// Enable local HTTP control server
    pub enable_socket_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Deployer worker options
    pub deployer: deployer::Options,

    /// Number of job records kept in memory
    pub job_history: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl AppOptions {
    /// Build options from the settings file
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            orchestrator: OrchestratorOptions {
                deployments_dir: settings.deployments_dir.clone(),
                container_cli: settings.container_cli.clone(),
                prune: settings.prune,
                execution: settings.execution,
            },
            proxy: ProxyOptions {
                admin_url: settings.proxy.admin_url.clone(),
                server: settings.proxy.server.clone(),
                domain: settings.domain.clone(),
            },
            enable_socket_server: settings.server.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            deployer: deployer::Options {
                job_timeout: (settings.job_timeout_secs > 0)
                    .then(|| Duration::from_secs(settings.job_timeout_secs)),
            },
            job_history: settings.job_history,
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(60),
        }
    }
}

/// Reverse proxy options
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// Admin API base URL
    pub admin_url: String,

    /// HTTP server receiving the routes
    pub server: String,

    /// Domain under which branch subdomains are served
    pub domain: String,
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}
