//! Engine services
//!
//! Orchestration of recognition, sessions, journey progression, activity
//! tracking, and analytics over the db layer.

pub mod activity;
pub mod analytics;
pub mod journey;
pub mod resolver;
pub mod session_manager;
pub mod tokens;

/// Raw request metadata supplied by the transport layer
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
