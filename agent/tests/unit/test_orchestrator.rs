//! Orchestrator deploy/destroy/list against fake processes and routes

use preview_agent::deploy::ports::parse_host_port;
use preview_agent::deploy::progress::{ProgressLog, STDERR_PREFIX};
use preview_agent::models::deployment::{
    DeployAction, DeployRequest, DestroyRequest, RouteStatus,
};
use tokio_test::{assert_err, assert_ok};

use crate::support::{FakeRoutes, Fixture};

const CLONE_URL: &str = "https://github.com/acme/shop.git";

fn deploy_request(branch: &str) -> DeployRequest {
    DeployRequest {
        branch: branch.to_string(),
        clone_url: CLONE_URL.to_string(),
        root_directory: None,
    }
}

fn destroy_request(branch: &str) -> DestroyRequest {
    DestroyRequest {
        branch: branch.to_string(),
        root_directory: None,
    }
}

/// Range the OS hands out for port 0 binds
fn ephemeral_port_range() -> (u16, u16) {
    std::fs::read_to_string("/proc/sys/net/ipv4/ip_local_port_range")
        .ok()
        .and_then(|range| {
            let mut bounds = range.split_whitespace().map(|b| b.parse::<u16>());
            match (bounds.next(), bounds.next()) {
                (Some(Ok(low)), Some(Ok(high))) => Some((low, high)),
                _ => None,
            }
        })
        .unwrap_or((1024, u16::MAX))
}

#[tokio::test]
async fn test_deploy_creates_deployment_on_empty_root() {
    let fx = Fixture::new();
    let progress = ProgressLog::new();

    let summary = fx
        .orchestrator
        .deploy(&deploy_request("main"), &progress)
        .await
        .unwrap();

    assert_eq!(summary.action, DeployAction::Created);
    assert_eq!(summary.branch_handle.as_str(), "main");
    assert_eq!(summary.route, RouteStatus::Registered);
    assert_eq!(summary.url, "https://main.deploy.ink");
    assert!(summary.warnings.is_empty());

    assert!(fx.path("main").is_dir());
    let env = std::fs::read_to_string(fx.path("main/.env")).unwrap();
    assert_eq!(env.lines().filter(|l| l.starts_with("HOST_PORT=")).count(), 1);
    assert_eq!(parse_host_port(&env), Some(summary.host_port));
    assert_eq!(fx.routes.get("main"), Some(summary.host_port));

    let port = summary.host_port;
    let (low, high) = ephemeral_port_range();
    assert!(
        (low..=high).contains(&port),
        "port {port} outside the ephemeral range {low}-{high}"
    );
    assert_eq!(
        fx.events.all(),
        vec![
            "run: docker system prune -a --volumes -f".to_string(),
            format!("run: git clone -b main -- {CLONE_URL} main"),
            "run: docker compose up -d".to_string(),
            "route: has main".to_string(),
            format!("route: add main {port}"),
        ]
    );

    let lines = progress.lines();
    assert!(lines.contains(&"Creating deployment assets for branch \"main\".".to_string()));
    assert!(lines.contains(&format!("{STDERR_PREFIX}Cloning into 'main'...")));
    assert!(lines.contains(&"Starting deployment..".to_string()));
    assert!(lines.contains(&"Assigning domain to deployment..".to_string()));
}

#[tokio::test]
async fn test_deploy_twice_is_idempotent() {
    let fx = Fixture::new();

    let first = fx
        .orchestrator
        .deploy(&deploy_request("main"), &ProgressLog::new())
        .await
        .unwrap();
    fx.events.clear();

    let progress = ProgressLog::new();
    let second = fx
        .orchestrator
        .deploy(&deploy_request("main"), &progress)
        .await
        .unwrap();

    assert_eq!(second.action, DeployAction::Updated);
    assert_eq!(second.host_port, first.host_port);
    assert_eq!(second.route, RouteStatus::AlreadyPresent);
    assert_eq!(fx.routes.len(), 1);
    assert_eq!(fx.events.count_prefix("route: add"), 0);
    assert_eq!(fx.events.count_prefix("run: git clone"), 0);

    let pull = fx.events.position("run: git pull").unwrap();
    let build = fx.events.position("run: docker compose build").unwrap();
    let up = fx.events.position("run: docker compose up -d").unwrap();
    assert!(pull < build && build < up);

    let env = std::fs::read_to_string(fx.path("main/.env")).unwrap();
    assert_eq!(env.lines().filter(|l| l.starts_with("HOST_PORT=")).count(), 1);
    assert!(progress.lines().contains(
        &"Deployment for branch \"main\" already exists. Pulling latest changes to update."
            .to_string()
    ));
}

#[tokio::test]
async fn test_branch_with_slash_uses_handle() {
    let fx = Fixture::new();

    let summary = fx
        .orchestrator
        .deploy(&deploy_request("feature/login"), &ProgressLog::new())
        .await
        .unwrap();

    assert_eq!(summary.branch, "feature/login");
    assert_eq!(summary.branch_handle.as_str(), "feature-login");
    assert_eq!(summary.url, "https://feature-login.deploy.ink");
    assert!(fx.path("feature-login").is_dir());
    assert!(fx.routes.get("feature-login").is_some());
    assert!(fx
        .events
        .position(&format!("run: git clone -b feature/login -- {CLONE_URL} feature-login"))
        .is_some());

    let clone = &fx.runner.invocations()[1];
    assert_eq!(clone.working_directory.as_deref(), Some(fx.root.path()));
}

#[tokio::test]
async fn test_existing_host_port_is_kept() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.path("main")).unwrap();
    std::fs::write(fx.path("main/.env"), "DATABASE_URL=postgres://db\nHOST_PORT=4123\n").unwrap();

    let summary = fx
        .orchestrator
        .deploy(&deploy_request("main"), &ProgressLog::new())
        .await
        .unwrap();

    assert_eq!(summary.host_port, 4123);
    assert_eq!(summary.action, DeployAction::Updated);
    assert_eq!(fx.routes.get("main"), Some(4123));
    assert_eq!(
        std::fs::read_to_string(fx.path("main/.env")).unwrap(),
        "DATABASE_URL=postgres://db\nHOST_PORT=4123\n"
    );
}

#[tokio::test]
async fn test_existing_route_is_not_added_again() {
    let fx = Fixture::new();
    fx.routes.insert("main", 5000);

    let summary = fx
        .orchestrator
        .deploy(&deploy_request("main"), &ProgressLog::new())
        .await
        .unwrap();

    assert_eq!(summary.route, RouteStatus::AlreadyPresent);
    assert_eq!(fx.events.count_prefix("route: add"), 0);
    assert_eq!(fx.routes.get("main"), Some(5000));
}

#[tokio::test]
async fn test_route_lookup_failure_counts_as_absent() {
    let fx = Fixture::build(|r| r, FakeRoutes::failing_lookup, true);
    let progress = ProgressLog::new();

    let summary = fx
        .orchestrator
        .deploy(&deploy_request("main"), &progress)
        .await
        .unwrap();

    assert_eq!(summary.route, RouteStatus::Registered);
    assert_eq!(fx.events.count_prefix("route: add main"), 1);
    assert!(progress
        .lines()
        .iter()
        .any(|l| l.starts_with("warning: route lookup failed")));
}

#[tokio::test]
async fn test_route_add_failure_is_a_warning() {
    let fx = Fixture::build(|r| r, FakeRoutes::failing_add, true);

    let summary = fx
        .orchestrator
        .deploy(&deploy_request("main"), &ProgressLog::new())
        .await
        .unwrap();

    assert_eq!(summary.route, RouteStatus::Failed);
    assert_eq!(summary.warnings.len(), 1);
    assert!(fx.path("main/.env").is_file());
}

#[tokio::test]
async fn test_failed_command_stops_deploy() {
    let fx = Fixture::new();
    fx.runner.fail_on("compose up");
    let progress = ProgressLog::new();

    let err = fx
        .orchestrator
        .deploy(&deploy_request("main"), &progress)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), Some(1));
    assert_eq!(fx.events.count_prefix("route:"), 0);
    assert!(progress.lines().contains(&format!("{STDERR_PREFIX}boom")));
    // The checkout stays so the next deploy takes the update path
    assert!(fx.path("main").is_dir());
}

#[tokio::test]
async fn test_prune_can_be_disabled() {
    let fx = Fixture::build(|r| r, |r| r, false);

    assert_ok!(
        fx.orchestrator
            .deploy(&deploy_request("main"), &ProgressLog::new())
            .await
    );

    assert_eq!(fx.events.count_prefix("run: docker system prune"), 0);
}

#[tokio::test]
async fn test_invalid_requests_spawn_nothing() {
    let fx = Fixture::new();

    let mut escaping = deploy_request("main");
    escaping.root_directory = Some("../other".to_string());
    assert_err!(fx.orchestrator.deploy(&escaping, &ProgressLog::new()).await);

    let mut no_url = deploy_request("main");
    no_url.clone_url = "  ".to_string();
    assert_err!(fx.orchestrator.deploy(&no_url, &ProgressLog::new()).await);

    assert_err!(
        fx.orchestrator
            .deploy(&deploy_request(".."), &ProgressLog::new())
            .await
    );

    assert!(fx.events.all().is_empty());
}

#[tokio::test]
async fn test_option_like_clone_url_is_rejected() {
    let fx = Fixture::new();

    let mut request = deploy_request("main");
    request.clone_url = "--upload-pack=touch /tmp/owned".to_string();
    let err = fx
        .orchestrator
        .deploy(&request, &ProgressLog::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Clone URL"));
    assert!(fx.events.all().is_empty());
    assert!(!fx.path("main").exists());
}

#[tokio::test]
async fn test_destroy_removes_route_before_stopping() {
    let fx = Fixture::new();
    fx.orchestrator
        .deploy(&deploy_request("main"), &ProgressLog::new())
        .await
        .unwrap();
    fx.events.clear();

    let progress = ProgressLog::new();
    let summary = fx
        .orchestrator
        .destroy(&destroy_request("main"), &progress)
        .await
        .unwrap();

    assert!(summary.route_removed);
    assert_eq!(fx.routes.get("main"), None);
    assert!(!fx.path("main").exists());

    let remove = fx.events.position("route: remove main").unwrap();
    let down = fx.events.position("run: docker compose down").unwrap();
    assert!(remove < down);

    assert_eq!(
        progress.lines(),
        vec![
            "Removing domain from deployment..",
            "Stopping deployment..",
            "Pruning unused container resources..",
            "Destroying deployment assets..",
        ]
    );
}

#[tokio::test]
async fn test_destroy_without_route() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.path("feature-x")).unwrap();

    let summary = fx
        .orchestrator
        .destroy(&destroy_request("feature/x"), &ProgressLog::new())
        .await
        .unwrap();

    assert!(!summary.route_removed);
    assert_eq!(fx.events.count_prefix("route: remove"), 0);
    assert!(!fx.path("feature-x").exists());
}

#[tokio::test]
async fn test_destroy_runs_compose_in_root_directory() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.path("main/app")).unwrap();

    let request = DestroyRequest {
        branch: "main".to_string(),
        root_directory: Some("/app/".to_string()),
    };
    assert_ok!(fx.orchestrator.destroy(&request, &ProgressLog::new()).await);

    let down = fx
        .runner
        .invocations()
        .into_iter()
        .find(|i| i.display() == "docker compose down")
        .unwrap();
    assert_eq!(down.working_directory, Some(fx.path("main/app")));
}

#[tokio::test]
async fn test_destroy_unknown_branch() {
    let fx = Fixture::new();

    let err = fx
        .orchestrator
        .destroy(&destroy_request("ghost"), &ProgressLog::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(fx.events.all().is_empty());
}

#[tokio::test]
async fn test_list_deployments() {
    let fx = Fixture::new();
    assert!(fx.orchestrator.list().await.is_empty());

    for branch in ["main", "feature/x"] {
        fx.orchestrator
            .deploy(&deploy_request(branch), &ProgressLog::new())
            .await
            .unwrap();
    }

    let handles: Vec<String> = fx.orchestrator.list().await.into_iter().collect();
    assert_eq!(handles, vec!["feature-x", "main"]);
    assert!(fx.orchestrator.registry().exists("feature/x").await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_deploy_with_real_shell_steps() {
    use preview_agent::deploy::interpreter::{ExecutionPolicy, Interpreter};
    use preview_agent::deploy::process::SystemRunner;
    use preview_agent::deploy::program::{Invocation, Program};
    use std::sync::Arc;

    let tmp = tempfile::tempdir().unwrap();
    let interpreter = Interpreter::new(Arc::new(SystemRunner::new()), ExecutionPolicy::Sequential);
    let program = Program::sequence([
        Invocation::new("sh", ["-c", "echo ready > marker"])
            .in_dir(tmp.path())
            .into(),
        Invocation::new("sh", ["-c", "test -f marker && cp marker copy"])
            .in_dir(tmp.path())
            .into(),
        Invocation::new("sh", ["-c", "cat copy"])
            .in_dir(tmp.path())
            .into(),
    ]);

    let progress = ProgressLog::new();
    interpreter.execute(&program, &progress).await.unwrap();

    assert_eq!(progress.lines(), vec!["ready"]);
    assert!(tmp.path().join("copy").is_file());
}
