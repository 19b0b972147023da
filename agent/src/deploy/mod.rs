//! Deployment orchestration engine

pub mod interpreter;
pub mod orchestrator;
pub mod ports;
pub mod process;
pub mod program;
pub mod progress;
pub mod registry;
pub mod routes;
