//! Local agent registry
//!
//! A single-file SQLite store mapping agent ids to addresses, project paths
//! and lifecycle status, shared between agent servers and client SDKs on the
//! same host.

pub mod manager;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use manager::DatabaseManager;
pub use models::{AgentRecord, AgentStatus, AgentSummary, CapacityInfo};
pub use service::DatabaseService;
