//! Reverse proxy route management

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::http::routes::Route;

/// Registers subdomain routes keyed by branch handle
#[async_trait]
pub trait RouteRegistry: Send + Sync {
    /// Whether a route with exactly this identifier exists
    async fn has_route(&self, id: &str) -> Result<bool, AgentError>;

    /// Bind `{id}.{domain}` to `localhost:{port}`
    async fn add_route(&self, id: &str, port: u16) -> Result<(), AgentError>;

    /// Remove the route with this identifier
    async fn remove_route(&self, id: &str) -> Result<(), AgentError>;

    /// Public URL served by the route
    fn url_for(&self, id: &str) -> String;
}

/// Routes managed through the Caddy admin API
#[derive(Debug, Clone)]
pub struct CaddyRoutes {
    client: HttpClient,
    server: String,
    domain: String,
}

impl CaddyRoutes {
    pub fn new(client: HttpClient, server: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            client,
            server: server.into(),
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl RouteRegistry for CaddyRoutes {
    async fn has_route(&self, id: &str) -> Result<bool, AgentError> {
        let object = self
            .client
            .get_object_id(id)
            .await
            .map_err(|e| AgentError::RouteLookupFailure(format!("{id}: {e}")))?;
        let found = object.and_then(|o| o.id).is_some_and(|found| found == id);
        debug!("Route {} present: {}", id, found);
        Ok(found)
    }

    async fn add_route(&self, id: &str, port: u16) -> Result<(), AgentError> {
        let route = Route::reverse_proxy(id, &self.domain, port);
        self.client.add_route(&self.server, &route).await?;
        info!("Added route {}.{} -> localhost:{}", id, self.domain, port);
        Ok(())
    }

    async fn remove_route(&self, id: &str) -> Result<(), AgentError> {
        if self.client.delete_object(id).await? {
            info!("Removed route {}", id);
        } else {
            debug!("Route {} was already gone", id);
        }
        Ok(())
    }

    fn url_for(&self, id: &str) -> String {
        format!("https://{}.{}", id, self.domain)
    }
}
