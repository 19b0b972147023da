//! Deployment jobs and their state machine

pub mod fsm;
pub mod store;
