//! Deployment models

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Derive the filesystem/DNS-safe token for a branch name.
///
/// Path separators become `-`, so `feature/x` maps to `feature-x`.
pub fn branch_handle(branch: &str) -> String {
    branch.replace(['/', '\\'], "-")
}

/// Validated branch handle, used as directory name, route id and subdomain label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchHandle(String);

impl BranchHandle {
    /// Normalize a branch name into a handle
    pub fn from_branch(branch: &str) -> Result<Self, AgentError> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(AgentError::ValidationError("Branch name is empty".to_string()));
        }
        let handle = branch_handle(branch);
        if handle == "." || handle == ".." {
            return Err(AgentError::ValidationError(format!(
                "Branch name cannot be used as a deployment handle: {branch}"
            )));
        }
        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for BranchHandle {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Normalize the subpath holding the compose file.
///
/// Leading and trailing slashes are stripped and an empty value means the
/// repository root. Absolute paths and parent components are rejected so the
/// compose directory always stays inside the deployment directory.
pub fn normalize_root_directory(root: Option<&str>) -> Result<Option<PathBuf>, AgentError> {
    let Some(root) = root else {
        return Ok(None);
    };
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }

    let path = PathBuf::from(trimmed);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(AgentError::ValidationError(format!(
            "Root directory must be a relative path inside the repository: {root}"
        )));
    }
    Ok(Some(path))
}

/// Request to create or update a branch deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub branch: String,
    pub clone_url: String,
    /// Directory within the repository that contains the compose file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<String>,
}

impl DeployRequest {
    /// Check the request and return the branch handle and compose subpath
    pub fn validate(&self) -> Result<(BranchHandle, Option<PathBuf>), AgentError> {
        let handle = BranchHandle::from_branch(&self.branch)?;
        let root_directory = normalize_root_directory(self.root_directory.as_deref())?;
        let clone_url = self.clone_url.trim();
        if clone_url.is_empty() {
            return Err(AgentError::ValidationError("Clone URL is empty".to_string()));
        }
        if clone_url.starts_with('-') {
            return Err(AgentError::ValidationError(format!(
                "Clone URL must not start with '-': {clone_url}"
            )));
        }
        Ok((handle, root_directory))
    }
}

/// Request to tear a branch deployment down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyRequest {
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<String>,
}

impl DestroyRequest {
    pub fn validate(&self) -> Result<(BranchHandle, Option<PathBuf>), AgentError> {
        let handle = BranchHandle::from_branch(&self.branch)?;
        let root_directory = normalize_root_directory(self.root_directory.as_deref())?;
        Ok((handle, root_directory))
    }
}

/// Which path a deploy took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    Created,
    Updated,
}

/// Outcome of the route step of a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Registered,
    AlreadyPresent,
    Failed,
}

/// Result of a successful deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySummary {
    pub branch: String,
    pub branch_handle: BranchHandle,
    pub action: DeployAction,
    pub host_port: u16,
    pub url: String,
    pub route: RouteStatus,
    /// Non-fatal problems, such as a route that could not be registered
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Result of a successful destroy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroySummary {
    pub branch: String,
    pub branch_handle: BranchHandle,
    pub route_removed: bool,
}
