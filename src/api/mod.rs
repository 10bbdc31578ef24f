//! REST API boundary.

pub mod agent_routes;

pub use agent_routes::{create_agent_router, AgentState};
