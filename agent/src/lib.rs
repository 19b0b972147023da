//! Preview Agent Library
//!
//! Deploys each branch of a repository as its own compose stack, reachable
//! at `https://<branch>.<domain>` through a Caddy reverse proxy.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod jobs;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
