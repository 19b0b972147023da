//! Process runner: spawns one external command and streams its output

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::deploy::program::Invocation;
use crate::errors::AgentError;

/// Receives output lines of a running command, in arrival order per stream
pub trait OutputObserver: Send + Sync {
    /// A line written to standard output
    fn on_output(&self, line: &str);

    /// A line written to standard error
    fn on_error(&self, line: &str);
}

/// Observer that drops every line
pub struct Discard;

impl OutputObserver for Discard {
    fn on_output(&self, _line: &str) {}
    fn on_error(&self, _line: &str) {}
}

/// Result of a single successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Executes invocations. Resolves only on exit code 0; never retries.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &Invocation,
        observer: &dyn OutputObserver,
    ) -> Result<ExecutionResult, AgentError>;
}

/// Runs invocations as child processes of the agent
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        observer: &dyn OutputObserver,
    ) -> Result<ExecutionResult, AgentError> {
        let command_line = invocation.display();
        debug!("Spawning `{}` in {:?}", command_line, invocation.working_directory);

        let mut command = Command::new(&invocation.command);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|cause| AgentError::SpawnFailure {
            command: command_line.clone(),
            cause,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Internal("child stdout was not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::Internal("child stderr was not piped".to_string()))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut captured_out = String::new();
        let mut captured_err = String::new();
        let mut stdout_open = true;
        let mut stderr_open = true;

        // Both pipes are drained on this task so the observer is called
        // synchronously and never from another thread.
        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        observer.on_output(&line);
                        captured_out.push_str(&line);
                        captured_out.push('\n');
                    }
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        debug!("Stopped reading stdout of `{}`: {}", command_line, e);
                        stdout_open = false;
                    }
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        observer.on_error(&line);
                        captured_err.push_str(&line);
                        captured_err.push('\n');
                    }
                    Ok(None) => stderr_open = false,
                    Err(e) => {
                        debug!("Stopped reading stderr of `{}`: {}", command_line, e);
                        stderr_open = false;
                    }
                },
            }
        }

        let status = child.wait().await?;
        debug!("`{}` exited with {}", command_line, status);

        match status.code() {
            Some(0) => Ok(ExecutionResult {
                exit_code: 0,
                stdout: captured_out,
                stderr: captured_err,
            }),
            code => Err(AgentError::ExitFailure {
                command: command_line,
                code,
                output: if captured_err.trim().is_empty() {
                    captured_out
                } else {
                    captured_err
                },
            }),
        }
    }
}
