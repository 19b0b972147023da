//! Utility functions

use serde::{Deserialize, Serialize};

use crate::deploy::process::{CommandRunner, Discard, SystemRunner};
use crate::deploy::program::Invocation;
use crate::http::client::HttpClient;
use crate::storage::settings::Settings;

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Outcome of one diagnostic check
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Check that git, the container CLI and the proxy admin API are usable
pub async fn run_diagnostic(settings: &Settings) -> Vec<DiagnosticCheck> {
    let runner = SystemRunner::new();
    let mut checks = Vec::new();

    let commands = [
        ("git", Invocation::new("git", ["--version"])),
        (
            "container runtime",
            Invocation::new(&settings.container_cli, ["compose", "version"]),
        ),
    ];
    for (name, invocation) in commands {
        let check = match runner.run(&invocation, &Discard).await {
            Ok(result) => DiagnosticCheck {
                name: name.to_string(),
                passed: true,
                detail: result.stdout.lines().next().unwrap_or_default().to_string(),
            },
            Err(e) => DiagnosticCheck {
                name: name.to_string(),
                passed: false,
                detail: e.to_string(),
            },
        };
        checks.push(check);
    }

    let proxy = match HttpClient::new(&settings.proxy.admin_url) {
        Ok(client) => match client.get::<serde_json::Value>("/config/").await {
            Ok(_) => DiagnosticCheck {
                name: "proxy admin API".to_string(),
                passed: true,
                detail: format!("reachable at {}", client.base_url()),
            },
            Err(e) => DiagnosticCheck {
                name: "proxy admin API".to_string(),
                passed: false,
                detail: e.to_string(),
            },
        },
        Err(e) => DiagnosticCheck {
            name: "proxy admin API".to_string(),
            passed: false,
            detail: e.to_string(),
        },
    };
    checks.push(proxy);

    checks
}
