//! Program model: declarative multi-step shell procedures
//!
//! A [`Program`] is a small command tree built freshly for each operation and
//! executed by the [`Interpreter`](crate::deploy::interpreter::Interpreter).
//! Nodes own no external resources.

use std::fmt;
use std::path::{Path, PathBuf};

/// A single process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    /// Extra environment variables for the child
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_directory: None,
            env: Vec::new(),
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Command line as it would be typed in a shell
    pub fn display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Command tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    Invocation(Invocation),
    Sequence(Vec<Program>),
    LogMarker(String),
}

impl Program {
    pub fn sequence(children: impl IntoIterator<Item = Program>) -> Self {
        Program::Sequence(children.into_iter().collect())
    }

    /// Number of invocations in the tree
    pub fn invocation_count(&self) -> usize {
        match self {
            Program::Invocation(_) => 1,
            Program::Sequence(children) => children.iter().map(Program::invocation_count).sum(),
            Program::LogMarker(_) => 0,
        }
    }
}

impl From<Invocation> for Program {
    fn from(invocation: Invocation) -> Self {
        Program::Invocation(invocation)
    }
}

// ================================ BUILDERS ====================================== //

pub fn log(message: impl Into<String>) -> Program {
    Program::LogMarker(message.into())
}

/// Remove every unused image, container, network and volume
pub fn system_prune(container_cli: &str) -> Program {
    Invocation::new(container_cli, ["system", "prune", "-a", "--volumes", "-f"]).into()
}

/// `git clone -b {branch} -- {clone_url} {handle}` inside the deployments root
pub fn clone_repo(branch: &str, clone_url: &str, handle: &str, deployments_root: &Path) -> Program {
    Invocation::new("git", ["clone", "-b", branch, "--", clone_url, handle])
        .in_dir(deployments_root)
        .with_env("GIT_TERMINAL_PROMPT", "0")
        .into()
}

/// `git pull` inside an existing deployment directory
pub fn pull_latest(deployment_dir: &Path) -> Program {
    Invocation::new("git", ["pull"])
        .in_dir(deployment_dir)
        .with_env("GIT_TERMINAL_PROMPT", "0")
        .into()
}

pub fn compose_build(container_cli: &str, compose_dir: &Path) -> Program {
    Invocation::new(container_cli, ["compose", "build"])
        .in_dir(compose_dir)
        .into()
}

pub fn compose_up(container_cli: &str, compose_dir: &Path) -> Program {
    Invocation::new(container_cli, ["compose", "up", "-d"])
        .in_dir(compose_dir)
        .into()
}

pub fn compose_down(container_cli: &str, compose_dir: &Path) -> Program {
    Invocation::new(container_cli, ["compose", "down"])
        .in_dir(compose_dir)
        .into()
}
