//! Host port allocation, persisted in the deployment's `.env` file

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;

/// Name of the environment file read by docker compose
pub const ENV_FILE: &str = ".env";

/// Variable holding the host port the compose stack publishes on
pub const HOST_PORT_KEY: &str = "HOST_PORT";

/// Extract the first `HOST_PORT=<digits>` assignment from env file content.
/// Port 0 is not a usable assignment and is skipped.
pub fn parse_host_port(contents: &str) -> Option<u16> {
    let pattern = format!("{HOST_PORT_KEY}=");
    let mut rest = contents;
    while let Some(pos) = rest.find(&pattern) {
        let after = &rest[pos + pattern.len()..];
        let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
        if !digits.is_empty() {
            match digits.parse::<u16>() {
                Ok(0) | Err(_) => {}
                Ok(port) => return Some(port),
            }
        }
        rest = after;
    }
    None
}

/// Ask the OS for a currently free TCP port
pub async fn free_port() -> Result<u16, AgentError> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}

/// Return the port already assigned to the deployment, or assign a new one.
///
/// Re-deploying never reassigns a port while the env file keeps its
/// `HOST_PORT` line.
pub async fn ensure_port(compose_dir: &Dir) -> Result<u16, AgentError> {
    let env_file = compose_dir.file(ENV_FILE);

    match env_file.read_string().await {
        Ok(contents) => {
            if let Some(port) = parse_host_port(&contents) {
                debug!("Reusing {}={} from {:?}", HOST_PORT_KEY, port, env_file.path());
                return Ok(port);
            }
        }
        Err(e) => debug!("No readable env file at {:?}: {}", env_file.path(), e),
    }

    let port = free_port().await?;
    env_file.append_line(&format!("{HOST_PORT_KEY}={port}")).await?;
    info!("Assigned {}={} in {:?}", HOST_PORT_KEY, port, env_file.path());
    Ok(port)
}
