//! # RunAgent Rust SDK
//!
//! Host user-authored agent entrypoints over HTTP and WebSocket, and call
//! agents from Rust with the same wire contract every RunAgent SDK speaks.
//!
//! ## Features
//!
//! - **Client SDK**: REST and WebSocket clients for invoking deployed agents
//! - **Agent Server**: a local server that loads a project, registers it in
//!   the local registry and exposes unary and streaming endpoints
//! - **Real-time Streaming**: WebSocket-based streaming with strict frame
//!   ordering and cancellation on disconnect
//! - **Local Registry**: SQLite-backed agent registry shared by servers and
//!   SDKs on the same host
//!
//! ## Quick Start
//!
//! ### Calling an agent
//!
//! ```rust,no_run
//! use runagent::{RunAgentClient, RunAgentClientConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     runagent::init_logging();
//!
//!     let client = RunAgentClient::new(
//!         RunAgentClientConfig::new("my-agent-id", "solve").with_local(true),
//!     )
//!     .await?;
//!
//!     let response = client.run(&[("q", json!("Hello, world!"))]).await?;
//!     println!("Response: {}", response);
//!     Ok(())
//! }
//! ```
//!
//! ### Streaming
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use runagent::{RunAgentClient, RunAgentClientConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RunAgentClient::new(
//!         RunAgentClientConfig::new("my-agent-id", "solve_stream").with_local(true),
//!     )
//!     .await?;
//!
//!     let mut stream = client.run_stream(&[("q", json!("Tell me a story"))]).await?;
//!     while let Some(chunk) = stream.next().await {
//!         match chunk {
//!             Ok(data) => println!("Chunk: {}", data),
//!             Err(e) => eprintln!("Stream error: {}", e),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Serving a project
//!
//! ```rust,no_run
//! use runagent::server::{CallableRegistry, LocalServer};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = CallableRegistry::new();
//!     registry.register_fn("main.py", "run", |_args, kwargs| async move {
//!         let q = kwargs.get("q").and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(json!(format!("ok:{}", q)))
//!     });
//!
//!     let server = LocalServer::from_path(
//!         "./my-agent".into(),
//!         &registry,
//!         None,
//!         None,
//!     )
//!     .await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Connection settings resolve with the same precedence everywhere:
//! explicit argument, then environment variable, then library default.
//!
//! ```bash
//! export RUNAGENT_API_KEY="your-api-key"
//! export RUNAGENT_BASE_URL="https://api.runagent.ai"
//! export RUNAGENT_LOGGING_LEVEL="info"
//! ```

pub mod client;
pub mod constants;
pub mod types;
pub mod utils;

#[cfg(feature = "db")]
pub mod db;

#[cfg(feature = "server")]
pub mod server;

/// Blocking (synchronous) wrapper for RunAgentClient
pub mod blocking;

// Re-export commonly used types and functions
pub use client::{RestClient, RunAgentClient, RunAgentClientConfig, SocketClient};
pub use types::{ErrorBlock, ErrorCode, RunAgentError, RunAgentResult};

// Re-export blocking client for convenience
pub use blocking::{BlockingStream, RunAgentClient as BlockingRunAgentClient};

#[cfg(feature = "db")]
pub use db::DatabaseService;

#[cfg(feature = "server")]
pub use server::{CallableRegistry, LocalServer};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging for the RunAgent SDK
///
/// Sets up structured logging with levels configurable via the
/// `RUNAGENT_LOGGING_LEVEL` environment variable.
///
/// # Example
///
/// ```rust,no_run
/// runagent::init_logging();
/// tracing::info!("RunAgent SDK initialized");
/// ```
pub fn init_logging() {
    let level = std::env::var(constants::ENV_RUNAGENT_LOGGING_LEVEL)
        .unwrap_or_else(|_| "info".to_string());
    let directive = format!("runagent={}", level)
        .parse()
        .unwrap_or_else(|_| "runagent=info".parse().expect("static directive parses"));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();
}

/// Configuration builder for the RunAgent SDK
///
/// # Example
///
/// ```rust,no_run
/// use runagent::RunAgentConfig;
///
/// let config = RunAgentConfig::new()
///     .with_api_key("your-api-key")
///     .with_base_url("https://api.runagent.ai")
///     .with_logging()
///     .build();
/// ```
#[derive(Default)]
pub struct RunAgentConfig {
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Base URL for API endpoints
    pub base_url: Option<String>,
    /// Whether to enable logging
    pub enable_logging: bool,
}

impl RunAgentConfig {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key for authentication
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL for API endpoints
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Enable logging initialization
    pub fn with_logging(mut self) -> Self {
        self.enable_logging = true;
        self
    }

    /// Build the configuration and optionally initialize logging
    pub fn build(self) -> Self {
        if self.enable_logging {
            init_logging();
        }
        self
    }
}

/// Prelude module for convenient imports
///
/// # Example
///
/// ```rust,no_run
/// use runagent::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{RestClient, RunAgentClient, RunAgentClientConfig, SocketClient};
    pub use crate::types::{ErrorBlock, ErrorCode, RunAgentError, RunAgentResult};

    #[cfg(feature = "db")]
    pub use crate::db::DatabaseService;

    #[cfg(feature = "server")]
    pub use crate::server::{CallableRegistry, LocalServer};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = RunAgentConfig::new()
            .with_api_key("test-key")
            .with_base_url("http://localhost:8000")
            .build();

        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_config_default() {
        let config = RunAgentConfig::default();
        assert!(config.api_key.is_none());
        assert!(config.base_url.is_none());
        assert!(!config.enable_logging);
    }
}
