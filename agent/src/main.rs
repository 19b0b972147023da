//! Preview Agent - Entry Point
//!
//! Runs as a daemon serving the control API, or executes a single
//! deploy/destroy/list command and exits.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use colored::*;
use preview_agent::app::options::AppOptions;
use preview_agent::app::run::run;
use preview_agent::app::state::build_orchestrator;
use preview_agent::deploy::orchestrator::Orchestrator;
use preview_agent::deploy::progress::{ProgressSink, STDERR_PREFIX};
use preview_agent::filesys::file::File;
use preview_agent::logs::{init_logging, LogLevel, LogOptions};
use preview_agent::models::deployment::{DeployRequest, DestroyRequest};
use preview_agent::storage::layout::StorageLayout;
use preview_agent::storage::settings::Settings;
use preview_agent::utils::{run_diagnostic, version_info};

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let layout = StorageLayout::from_env();
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} Unable to read settings file: {}", "✗".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let one_shot = ["diagnostic", "diag", "list", "deploy", "destroy"]
        .iter()
        .any(|cmd| cli_args.contains_key(*cmd));

    // Initialize logging; one-shot commands keep stdout for progress
    let log_options = LogOptions {
        log_level: if one_shot {
            LogLevel::Warn
        } else {
            settings.log_level.clone()
        },
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        json_format: settings.log_json,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        let checks = run_diagnostic(&settings).await;
        let mut healthy = true;
        for check in &checks {
            let mark = if check.passed { "✓".green() } else { "✗".red() };
            println!("{} {}: {}", mark, check.name.bold(), check.detail);
            healthy &= check.passed;
        }
        return exit_code(healthy);
    }

    let options = AppOptions::from_settings(&settings);

    if cli_args.contains_key("list")
        || cli_args.contains_key("deploy")
        || cli_args.contains_key("destroy")
    {
        let orchestrator = match build_orchestrator(&options) {
            Ok(orchestrator) => orchestrator,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                return ExitCode::FAILURE;
            }
        };
        return run_command(&orchestrator, &cli_args).await;
    }

    // Run the daemon
    info!("Running preview agent with options: {:?}", options);
    match run(options, await_shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to run the agent: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_command(orchestrator: &Orchestrator, cli_args: &HashMap<String, String>) -> ExitCode {
    if cli_args.contains_key("list") {
        let deployments = orchestrator.list().await;
        if deployments.is_empty() {
            println!("{}", "No deployments".dimmed());
        }
        for handle in deployments {
            println!("{handle}");
        }
        return ExitCode::SUCCESS;
    }

    let Some(branch) = cli_args.get("branch").cloned() else {
        eprintln!("{} Missing --branch=<name>", "✗".red());
        return ExitCode::FAILURE;
    };
    let root_directory = cli_args.get("root-dir").cloned();
    let sink = ConsoleSink;

    if cli_args.contains_key("deploy") {
        let Some(clone_url) = cli_args.get("clone-url").cloned() else {
            eprintln!("{} Missing --clone-url=<url>", "✗".red());
            return ExitCode::FAILURE;
        };
        let request = DeployRequest {
            branch,
            clone_url,
            root_directory,
        };
        return match orchestrator.deploy(&request, &sink).await {
            Ok(summary) => {
                println!("{} Deployed {} at {}", "✓".green(), summary.branch, summary.url);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let request = DestroyRequest {
        branch,
        root_directory,
    };
    match orchestrator.destroy(&request, &sink).await {
        Ok(summary) => {
            println!("{} Removed deployment for {}", "✓".green(), summary.branch);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Prints progress lines to the terminal, stderr output dimmed
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn append(&self, line: &str) {
        match line.strip_prefix(STDERR_PREFIX) {
            Some(rest) => println!("  {}", rest.dimmed()),
            None if line.starts_with("warning:") => println!("{}", line.yellow()),
            None => println!("{} {}", "›".blue(), line),
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
