//! Invocation dispatch into user callables
//!
//! The dispatcher is the single boundary between the typed wire world and
//! the untyped user world: it owns tag lookup, the transport/tag mode gate,
//! timeouts, and the mapping of user errors into the canonical taxonomy. No
//! raw user error ever crosses the transport boundary.

use crate::server::callables::AgentCallable;
use crate::server::loader::ResolvedEntrypoint;
use crate::types::{ErrorCode, InvocationRequest, RunAgentError, RunAgentResult};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Chunk stream with errors already mapped into the taxonomy
pub type InvocationStream = Pin<Box<dyn Stream<Item = RunAgentResult<Value>> + Send>>;

/// Dispatches invocations for one loaded project
#[derive(Debug)]
pub struct Dispatcher {
    entrypoints: HashMap<String, ResolvedEntrypoint>,
}

impl Dispatcher {
    pub fn new(resolved: Vec<ResolvedEntrypoint>) -> Self {
        let entrypoints = resolved
            .into_iter()
            .map(|ep| (ep.spec.tag.clone(), ep))
            .collect();
        Self { entrypoints }
    }

    /// Known tags, sorted for stable diagnostics
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.entrypoints.keys().cloned().collect();
        tags.sort();
        tags
    }

    fn lookup(&self, tag: &str) -> RunAgentResult<&ResolvedEntrypoint> {
        self.entrypoints.get(tag).ok_or_else(|| {
            RunAgentError::execution(
                ErrorCode::EntrypointNotFound,
                format!("Unknown entrypoint '{}'", tag),
                Some(format!("Available tags: {}", self.tags().join(", "))),
                None,
            )
        })
    }

    fn validate_request(request: &InvocationRequest) -> RunAgentResult<()> {
        if request.timeout_seconds <= 0 {
            return Err(RunAgentError::execution(
                ErrorCode::ValidationError,
                format!(
                    "timeout_seconds must be positive, got {}",
                    request.timeout_seconds
                ),
                Some("Use a positive timeout or omit the field for the default".to_string()),
                None,
            ));
        }
        Ok(())
    }

    /// Run a unary invocation.
    ///
    /// The transport/tag gate fires before user code: a streaming tag on
    /// this path is `STREAM_ENTRYPOINT`. `timeout_seconds` is wall-clock
    /// from dispatch to callable return.
    pub async fn run(&self, request: &InvocationRequest) -> RunAgentResult<Value> {
        Self::validate_request(request)?;
        let entrypoint = self.lookup(&request.entrypoint_tag)?;

        if entrypoint.is_streaming() {
            return Err(RunAgentError::execution(
                ErrorCode::StreamEntrypoint,
                format!(
                    "Entrypoint '{}' is a streaming entrypoint",
                    request.entrypoint_tag
                ),
                Some("Use run_stream() for streaming entrypoints".to_string()),
                None,
            ));
        }

        let future = match &entrypoint.callable {
            AgentCallable::Unary(f) => f(request.input_args.clone(), request.input_kwargs.clone()),
            AgentCallable::Streaming(_) => {
                // Nominal tag/callable mismatch, enforced behaviorally here
                return Err(RunAgentError::execution(
                    ErrorCode::ExecutionError,
                    format!(
                        "Entrypoint '{}' produced a chunk stream where a single value was expected",
                        request.entrypoint_tag
                    ),
                    Some(format!(
                        "Rename the tag to '{}_stream' or register a unary callable",
                        request.entrypoint_tag
                    )),
                    None,
                ));
            }
        };

        let timeout = Duration::from_secs(request.timeout_seconds as u64);
        match tokio::time::timeout(timeout, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(user_err)) => Err(Self::capture_user_error(user_err)),
            Err(_) => Err(Self::timeout_error(&request.entrypoint_tag, request.timeout_seconds)),
        }
    }

    /// Open a streaming invocation.
    ///
    /// Symmetric gate: a unary tag on this path is `NON_STREAM_ENTRYPOINT`.
    /// `timeout_seconds` applies to inactivity; every produced chunk resets
    /// the timer. Dropping the returned stream cancels the producer at its
    /// next yield point.
    pub fn open_stream(&self, request: &InvocationRequest) -> RunAgentResult<InvocationStream> {
        Self::validate_request(request)?;
        let entrypoint = self.lookup(&request.entrypoint_tag)?;

        if !entrypoint.is_streaming() {
            return Err(RunAgentError::execution(
                ErrorCode::NonStreamEntrypoint,
                format!(
                    "Entrypoint '{}' is not a streaming entrypoint",
                    request.entrypoint_tag
                ),
                Some("Use run() for non-streaming entrypoints".to_string()),
                None,
            ));
        }

        let mut inner = match &entrypoint.callable {
            AgentCallable::Streaming(f) => {
                f(request.input_args.clone(), request.input_kwargs.clone())
            }
            AgentCallable::Unary(_) => {
                return Err(RunAgentError::execution(
                    ErrorCode::ExecutionError,
                    format!(
                        "Entrypoint '{}' did not produce a chunk stream",
                        request.entrypoint_tag
                    ),
                    Some("Register a streaming callable for _stream tags".to_string()),
                    None,
                ));
            }
        };

        let tag = request.entrypoint_tag.clone();
        let idle_timeout = Duration::from_secs(request.timeout_seconds as u64);
        let timeout_seconds = request.timeout_seconds;

        let stream = async_stream::stream! {
            loop {
                match tokio::time::timeout(idle_timeout, inner.next()).await {
                    Ok(Some(Ok(chunk))) => yield Ok(chunk),
                    Ok(Some(Err(user_err))) => {
                        yield Err(Self::capture_user_error(user_err));
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(Self::timeout_error(&tag, timeout_seconds));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Map a user error into `EXECUTION_ERROR`, keeping the cause chain as
    /// structured details and never letting the raw error escape.
    fn capture_user_error(err: anyhow::Error) -> RunAgentError {
        let chain: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        let mut trace = format!("{:?}", err);
        trace.truncate(2048);

        RunAgentError::execution(
            ErrorCode::ExecutionError,
            err.to_string(),
            None,
            Some(json!({
                "error_type": error_type_name(&err),
                "chain": chain,
                "trace": trace,
            })),
        )
    }

    fn timeout_error(tag: &str, timeout_seconds: i64) -> RunAgentError {
        RunAgentError::execution(
            ErrorCode::Timeout,
            format!(
                "Entrypoint '{}' exceeded {} second(s)",
                tag, timeout_seconds
            ),
            Some("Raise timeout_seconds or make the entrypoint faster".to_string()),
            None,
        )
    }
}

/// Best-effort type name of the root cause, from its debug rendering
fn error_type_name(err: &anyhow::Error) -> String {
    let debug = format!("{:?}", err.root_cause());
    debug
        .split(|c: char| c == '(' || c == '{' || c.is_whitespace())
        .next()
        .unwrap_or("Error")
        .to_string()
}
