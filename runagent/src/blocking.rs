//! Blocking (synchronous) wrapper for RunAgentClient
//!
//! This module provides a synchronous interface that wraps the async client.
//! It uses a Tokio runtime internally to block on async operations.
//!
//! # Example
//!
//! ```rust,no_run
//! use runagent::blocking::{RunAgentClient, RunAgentClientConfig};
//! use serde_json::json;
//!
//! fn main() -> runagent::RunAgentResult<()> {
//!     let client = RunAgentClient::new(
//!         RunAgentClientConfig::new("agent-id", "solve").with_local(true),
//!     )?;
//!
//!     let result = client.run(&[("q", json!("hello"))])?;
//!     println!("Result: {}", result);
//!     Ok(())
//! }
//! ```

use crate::client::RunAgentClient as AsyncRunAgentClient;
use crate::types::{AgentArchitecture, RunAgentError, RunAgentResult};
use futures::Stream;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use tokio::runtime::Runtime;

// Re-export for convenience
pub use crate::client::RunAgentClientConfig;

/// Blocking (synchronous) wrapper for RunAgentClient
///
/// Prefer the async client where a runtime is already available; this one
/// owns its own.
pub struct RunAgentClient {
    inner: AsyncRunAgentClient,
    runtime: Runtime,
}

impl RunAgentClient {
    /// Create a new blocking RunAgent client
    pub fn new(config: RunAgentClientConfig) -> RunAgentResult<Self> {
        let runtime = Runtime::new()
            .map_err(|e| RunAgentError::connection(format!("Failed to create runtime: {}", e)))?;

        let inner = runtime.block_on(AsyncRunAgentClient::new(config))?;

        Ok(Self { inner, runtime })
    }

    /// Execute a non-streaming entrypoint, blocking until it completes
    pub fn run(&self, input_kwargs: &[(&str, Value)]) -> RunAgentResult<Value> {
        self.runtime.block_on(self.inner.run(input_kwargs))
    }

    /// Execute a non-streaming entrypoint with both args and kwargs
    pub fn run_with_args(
        &self,
        input_args: &[Value],
        input_kwargs: &[(&str, Value)],
    ) -> RunAgentResult<Value> {
        self.runtime
            .block_on(self.inner.run_with_args(input_args, input_kwargs))
    }

    /// Execute a streaming entrypoint.
    ///
    /// Returns a blocking iterator that yields chunks as they arrive,
    /// incrementally rather than collected up front.
    pub fn run_stream(&self, input_kwargs: &[(&str, Value)]) -> RunAgentResult<BlockingStream> {
        let stream = self.runtime.block_on(self.inner.run_stream(input_kwargs))?;
        Ok(BlockingStream::new(stream))
    }

    /// Execute a streaming entrypoint with both args and kwargs
    pub fn run_stream_with_args(
        &self,
        input_args: &[Value],
        input_kwargs: &[(&str, Value)],
    ) -> RunAgentResult<BlockingStream> {
        let stream = self
            .runtime
            .block_on(self.inner.run_stream_with_args(input_args, input_kwargs))?;
        Ok(BlockingStream::new(stream))
    }

    /// Get agent architecture
    pub fn get_agent_architecture(&self) -> RunAgentResult<AgentArchitecture> {
        self.runtime.block_on(self.inner.get_agent_architecture())
    }

    /// Health check
    pub fn health_check(&self) -> RunAgentResult<bool> {
        self.runtime.block_on(self.inner.health_check())
    }

    /// Get agent ID
    pub fn agent_id(&self) -> &str {
        self.inner.agent_id()
    }

    /// Get entrypoint tag
    pub fn entrypoint_tag(&self) -> &str {
        self.inner.entrypoint_tag()
    }

    /// Get extra parameters
    pub fn extra_params(&self) -> &HashMap<String, Value> {
        self.inner.extra_params()
    }

    /// Check if this is a local client
    pub fn is_local(&self) -> bool {
        self.inner.is_local()
    }
}

/// Blocking iterator over a streaming response
///
/// Each `next()` call blocks until the next chunk arrives or the stream
/// terminates.
pub struct BlockingStream {
    receiver: std::sync::mpsc::Receiver<RunAgentResult<Value>>,
    _handle: std::thread::JoinHandle<()>, // Keep the background task alive
}

impl BlockingStream {
    pub(crate) fn new(
        mut stream: Pin<Box<dyn Stream<Item = RunAgentResult<Value>> + Send>>,
    ) -> Self {
        use futures::StreamExt;
        use std::sync::mpsc;
        use std::thread;

        let (tx, rx) = mpsc::channel();

        // Poll the stream from a dedicated runtime thread
        let handle = thread::spawn(move || {
            let rt = match Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = tx.send(Err(RunAgentError::connection(format!(
                        "Failed to create runtime: {}",
                        e
                    ))));
                    return;
                }
            };
            rt.block_on(async move {
                while let Some(item) = stream.next().await {
                    if tx.send(item).is_err() {
                        // Receiver dropped, stop polling
                        break;
                    }
                }
            });
        });

        Self {
            receiver: rx,
            _handle: handle,
        }
    }
}

impl Iterator for BlockingStream {
    type Item = RunAgentResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}
