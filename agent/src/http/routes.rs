//! Caddy route API

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::http::client::HttpClient;

/// A Caddy HTTP route sending one host to one local upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "@id")]
    pub id: String,
    pub handle: Vec<Handler>,
    #[serde(rename = "match")]
    pub matchers: Vec<HostMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    pub handler: String,
    pub transport: Transport,
    pub upstreams: Vec<Upstream>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    pub dial: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMatch {
    pub host: Vec<String>,
}

impl Route {
    /// Reverse proxy `{id}.{domain}` to `localhost:{port}`
    pub fn reverse_proxy(id: &str, domain: &str, port: u16) -> Self {
        Self {
            id: id.to_string(),
            handle: vec![Handler {
                handler: "reverse_proxy".to_string(),
                transport: Transport {
                    protocol: "http".to_string(),
                },
                upstreams: vec![Upstream {
                    dial: format!("localhost:{port}"),
                }],
            }],
            matchers: vec![HostMatch {
                host: vec![format!("{id}.{domain}")],
            }],
        }
    }
}

/// Only the identifier of whatever object the admin API returns
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectId {
    #[serde(rename = "@id")]
    pub id: Option<String>,
}

impl HttpClient {
    /// Look up an object by `@id`
    pub async fn get_object_id(&self, id: &str) -> Result<Option<ObjectId>, AgentError> {
        self.get(&format!("/id/{id}")).await
    }

    /// Append a route to an HTTP server's route list
    pub async fn add_route(&self, server: &str, route: &Route) -> Result<(), AgentError> {
        let path = format!("/config/apps/http/servers/{server}/routes");
        self.post(&path, route).await
    }

    /// Delete an object by `@id`
    pub async fn delete_object(&self, id: &str) -> Result<bool, AgentError> {
        self.delete(&format!("/id/{id}")).await
    }
}
