//! Utility modules for the RunAgent SDK

pub mod config;
pub mod port;
pub mod serializer;

// Re-export commonly used utilities
pub use config::Config;
pub use port::PortManager;
pub use serializer::CoreSerializer;
