//! Type definitions for the RunAgent SDK

pub mod errors;
pub mod schema;

// Re-export commonly used types
pub use errors::{ErrorBlock, ErrorCode, RunAgentError, RunAgentResult};
pub use schema::*;
