//! Reverse proxy admin API client

pub mod client;
pub mod routes;
