//! Error types for the preview agent

use thiserror::Error;

/// Main error type for the preview agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The command could not be started at all (missing binary, permissions)
    #[error("Failed to start `{command}`: {cause}")]
    SpawnFailure {
        command: String,
        #[source]
        cause: std::io::Error,
    },

    /// The command ran and exited unsuccessfully
    #[error("`{command}` failed ({}){}", describe_exit(.code), describe_output(.output))]
    ExitFailure {
        command: String,
        /// `None` when the process was terminated by a signal
        code: Option<i32>,
        /// Captured stderr (or stdout when stderr was empty)
        output: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Route lookup failed: {0}")]
    RouteLookupFailure(String),

    #[error("Route error: {0}")]
    RouteError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Job error: {0}")]
    JobError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Exit code of a failed subprocess, if this is an exit failure
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            AgentError::ExitFailure { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::NotFound(_))
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn describe_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
