//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deploy::interpreter::ExecutionPolicy;
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily rolling log files to the layout's logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory holding one checkout per branch
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,

    /// Domain under which branches get a subdomain
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Reverse proxy configuration
    #[serde(default)]
    pub proxy: ProxySettings,

    /// Local control server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Container CLI binary
    #[serde(default = "default_container_cli")]
    pub container_cli: String,

    /// Prune unused container resources around deploys and destroys
    #[serde(default = "default_true")]
    pub prune: bool,

    /// Execution policy for composite programs
    #[serde(default)]
    pub execution: ExecutionPolicy,

    /// Per-job deadline in seconds, 0 disables it
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// Number of job records kept in memory
    #[serde(default = "default_job_history")]
    pub job_history: usize,
}

fn default_true() -> bool {
    true
}

fn default_deployments_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deployments")
}

fn default_domain() -> String {
    "deploy.ink".to_string()
}

fn default_container_cli() -> String {
    "docker".to_string()
}

fn default_job_timeout() -> u64 {
    30 * 60
}

fn default_job_history() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            deployments_dir: default_deployments_dir(),
            domain: default_domain(),
            proxy: ProxySettings::default(),
            server: ServerSettings::default(),
            container_cli: default_container_cli(),
            prune: true,
            execution: ExecutionPolicy::Sequential,
            job_timeout_secs: default_job_timeout(),
            job_history: default_job_history(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist
    pub async fn load(file: &File) -> Result<Self, AgentError> {
        if !file.exists().await {
            info!("No settings file at {:?}, using defaults", file.path());
            return Ok(Self::default());
        }
        let settings: Settings = file.read_json().await?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.domain.trim().is_empty() {
            return Err(AgentError::ConfigError("domain must not be empty".to_string()));
        }
        if self.proxy.server.trim().is_empty() {
            return Err(AgentError::ConfigError("proxy.server must not be empty".to_string()));
        }
        url::Url::parse(&self.proxy.admin_url).map_err(|e| {
            AgentError::ConfigError(format!("proxy.admin_url is invalid: {e}"))
        })?;
        Ok(())
    }
}

/// Reverse proxy (Caddy) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Base URL of the admin API
    #[serde(default = "default_admin_url")]
    pub admin_url: String,

    /// Name of the HTTP server that receives branch routes
    #[serde(default = "default_proxy_server")]
    pub server: String,
}

fn default_admin_url() -> String {
    "http://localhost:2019".to_string()
}

fn default_proxy_server() -> String {
    "dashboard".to_string()
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            admin_url: default_admin_url(),
            server: default_proxy_server(),
        }
    }
}

/// Control server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8090
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}
