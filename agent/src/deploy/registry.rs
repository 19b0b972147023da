//! Deployment directory registry

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::models::deployment::{branch_handle, BranchHandle};

/// Maps branches to their checkout directories under the deployments root
#[derive(Debug, Clone)]
pub struct DeploymentRegistry {
    root: Dir,
}

impl DeploymentRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Dir::new(root),
        }
    }

    /// The deployments root
    pub fn root(&self) -> &Dir {
        &self.root
    }

    /// Directory holding the checkout for a handle
    pub fn directory(&self, handle: &BranchHandle) -> Dir {
        self.root.subdir(handle)
    }

    /// Directory holding the compose file for a handle
    pub fn compose_directory(&self, handle: &BranchHandle, root_directory: Option<&Path>) -> Dir {
        let dir = self.directory(handle);
        match root_directory {
            Some(sub) => dir.subdir(sub),
            None => dir,
        }
    }

    /// Handles of every existing deployment.
    ///
    /// A missing or unreadable root is a normal state on a fresh host and
    /// yields an empty set.
    pub async fn list(&self) -> BTreeSet<String> {
        match self.root.list_dir_names().await {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                debug!("Unable to list deployments in {:?}: {}", self.root.path(), e);
                BTreeSet::new()
            }
        }
    }

    /// Whether a deployment exists for the branch
    pub async fn exists(&self, branch: &str) -> bool {
        self.list().await.contains(&branch_handle(branch.trim()))
    }

    /// Recursively delete the deployment directory
    pub async fn remove(&self, handle: &BranchHandle) -> Result<(), AgentError> {
        let dir = self.directory(handle);
        info!("Removing deployment directory {:?}", dir.path());
        dir.delete().await
    }
}
