//! Caddy admin API client against an in-process mock admin server

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use preview_agent::deploy::interpreter::ExecutionPolicy;
use preview_agent::deploy::orchestrator::{Orchestrator, OrchestratorOptions};
use preview_agent::deploy::progress::ProgressLog;
use preview_agent::deploy::routes::{CaddyRoutes, RouteRegistry};
use preview_agent::errors::AgentError;
use preview_agent::http::client::HttpClient;
use preview_agent::models::deployment::{DeployRequest, RouteStatus};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::support::{Events, FakeRunner};

#[derive(Clone, Default)]
struct Admin {
    routes: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Admin {
    fn routes(&self) -> Vec<(String, Value)> {
        self.routes.lock().unwrap().clone()
    }
}

async fn get_object(State(admin): State<Admin>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    admin
        .routes()
        .into_iter()
        .map(|(_, route)| route)
        .find(|route| route["@id"] == id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn delete_object(State(admin): State<Admin>, Path(id): Path<String>) -> StatusCode {
    let mut routes = admin.routes.lock().unwrap();
    let before = routes.len();
    routes.retain(|(_, route)| route["@id"] != id);
    if routes.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

async fn add_route(
    State(admin): State<Admin>,
    Path(server): Path<String>,
    Json(route): Json<Value>,
) -> StatusCode {
    admin.routes.lock().unwrap().push((server, route));
    StatusCode::OK
}

/// Serve a mock admin API on an ephemeral port, returning its base URL
async fn spawn_admin(admin: Admin) -> String {
    let app = Router::new()
        .route("/id/{id}", get(get_object).delete(delete_object))
        .route("/config/apps/http/servers/{server}/routes", post(add_route))
        .with_state(admin);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn caddy(base_url: &str) -> CaddyRoutes {
    CaddyRoutes::new(HttpClient::new(base_url).unwrap(), "dashboard", "deploy.ink")
}

#[tokio::test]
async fn test_add_route_posts_reverse_proxy() {
    let admin = Admin::default();
    let routes = caddy(&spawn_admin(admin.clone()).await);

    assert!(!routes.has_route("main").await.unwrap());
    routes.add_route("main", 4123).await.unwrap();
    assert!(routes.has_route("main").await.unwrap());

    let posted = admin.routes();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].0, "dashboard");
    assert_eq!(
        posted[0].1,
        json!({
            "@id": "main",
            "handle": [{
                "handler": "reverse_proxy",
                "transport": { "protocol": "http" },
                "upstreams": [{ "dial": "localhost:4123" }]
            }],
            "match": [{ "host": ["main.deploy.ink"] }]
        })
    );
}

#[tokio::test]
async fn test_remove_route_tolerates_missing() {
    let admin = Admin::default();
    let routes = caddy(&spawn_admin(admin.clone()).await);

    routes.add_route("feature-x", 5000).await.unwrap();
    routes.remove_route("feature-x").await.unwrap();
    assert!(admin.routes().is_empty());

    // Already gone
    routes.remove_route("feature-x").await.unwrap();
}

#[tokio::test]
async fn test_unreachable_admin_is_lookup_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let routes = caddy(&format!("http://{addr}"));
    let err = routes.has_route("main").await.unwrap_err();
    assert!(matches!(err, AgentError::RouteLookupFailure(_)));
    assert_eq!(routes.url_for("main"), "https://main.deploy.ink");
}

#[tokio::test]
async fn test_deploy_registers_route_with_proxy() {
    let admin = Admin::default();
    let routes = Arc::new(caddy(&spawn_admin(admin.clone()).await));
    let root = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(
        OrchestratorOptions {
            deployments_dir: root.path().to_path_buf(),
            container_cli: "docker".to_string(),
            prune: false,
            execution: ExecutionPolicy::Sequential,
        },
        Arc::new(FakeRunner::new(Events::default())),
        routes,
    );
    let request = DeployRequest {
        branch: "main".to_string(),
        clone_url: "https://github.com/acme/shop.git".to_string(),
        root_directory: None,
    };

    let first = orchestrator.deploy(&request, &ProgressLog::new()).await.unwrap();
    let second = orchestrator.deploy(&request, &ProgressLog::new()).await.unwrap();

    assert_eq!(first.route, RouteStatus::Registered);
    assert_eq!(second.route, RouteStatus::AlreadyPresent);
    assert_eq!(first.host_port, second.host_port);

    let posted = admin.routes();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1["match"][0]["host"][0], "main.deploy.ink");
    assert_eq!(
        posted[0].1["handle"][0]["upstreams"][0]["dial"],
        format!("localhost:{}", first.host_port)
    );
}
