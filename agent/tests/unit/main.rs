//! Integration tests for the preview agent


mod test_caddy;
mod test_interpreter;
mod test_orchestrator;
