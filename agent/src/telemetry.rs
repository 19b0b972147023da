//! Host resource reporting

use std::path::Path;

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// Resources left on the host for new deployments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemResources {
    /// Free space in bytes on the disk holding the deployments root
    pub disk_available: u64,

    /// Size in bytes of that disk
    pub disk_total: u64,

    /// Mount point the disk figures refer to
    pub disk_mount_point: Option<String>,

    /// Memory available for new processes, in bytes
    pub memory_available: u64,

    /// Total memory in bytes
    pub memory_total: u64,

    /// Hostname
    pub hostname: String,
}

/// Collect free disk space and available memory
pub fn collect_resources(deployments_dir: &Path) -> SystemResources {
    let mut sys = System::new();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let target = deployments_dir
        .canonicalize()
        .unwrap_or_else(|_| deployments_dir.to_path_buf());

    // Longest mount point containing the deployments root, else the largest disk
    let disk = disks
        .iter()
        .filter(|disk| target.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .or_else(|| disks.iter().max_by_key(|disk| disk.total_space()));

    SystemResources {
        disk_available: disk.map(|d| d.available_space()).unwrap_or(0),
        disk_total: disk.map(|d| d.total_space()).unwrap_or(0),
        disk_mount_point: disk.map(|d| d.mount_point().display().to_string()),
        memory_available: sys.available_memory(),
        memory_total: sys.total_memory(),
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
    }
}
