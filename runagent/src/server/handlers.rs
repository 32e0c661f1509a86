//! HTTP and WebSocket handlers for the agent server

use crate::server::dispatcher::Dispatcher;
use crate::types::{
    AgentArchitecture, ErrorBlock, ErrorCode, InvocationEnvelope, InvocationRequest, ProjectConfig,
    RunAgentError, StreamFrame,
};
use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared server state, built once the listener is bound
#[derive(Clone)]
pub struct ServerState {
    pub agent_id: String,
    pub config: ProjectConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub auth_token: Option<String>,
    pub host: String,
    pub port: u16,
    /// Set when the shutdown signal fires; the server is draining and no
    /// longer healthy
    pub draining: Arc<AtomicBool>,
}

impl ServerState {
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    fn architecture(&self) -> AgentArchitecture {
        AgentArchitecture {
            agent_id: self.agent_id.clone(),
            agent_name: self.config.agent_name.clone(),
            framework: self.config.framework.clone(),
            version: self.config.version.clone(),
            entrypoints: self.config.entrypoints.clone(),
        }
    }

    /// Bearer-token check. `query_token` is the WebSocket fallback for
    /// clients that cannot set headers.
    fn check_auth(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), ErrorBlock> {
        let Some(expected) = &self.auth_token else {
            return Ok(());
        };

        let header_token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if header_token == Some(expected.as_str()) || query_token == Some(expected.as_str()) {
            return Ok(());
        }

        Err(
            ErrorBlock::new(ErrorCode::AuthenticationError, "Missing or invalid bearer token")
                .with_suggestion("Send 'Authorization: Bearer <token>' or set RUNAGENT_API_KEY"),
        )
    }
}

fn envelope(status: StatusCode, env: InvocationEnvelope) -> Response {
    (status, Json(env)).into_response()
}

fn unknown_agent(agent_id: &str, state: &ServerState) -> InvocationEnvelope {
    InvocationEnvelope::err(
        ErrorBlock::new(
            ErrorCode::AgentNotFoundLocal,
            format!("Unknown agent '{}' at this server", agent_id),
        )
        .with_suggestion(format!("This server hosts agent '{}'", state.agent_id)),
    )
}

/// Root endpoint: server and address discovery info
pub async fn root(State(state): State<ServerState>) -> impl IntoResponse {
    Json(json!({
        "message": format!("RunAgent API - Agent {}", state.agent_id),
        "version": crate::VERSION,
        "agent_id": state.agent_id,
        "host": state.host,
        "port": state.port,
        "endpoints": {
            "GET /api/v1/health": "Health check",
            "GET /api/v1/agents/{id}/architecture": "Agent architecture",
            "POST /api/v1/agents/{id}/run": "Run agent",
            "WS /api/v1/agents/{id}/run-stream": "Stream agent",
        },
    }))
}

/// Health check endpoint.
///
/// Healthy only while the server is accepting work; once teardown begins
/// the probe goes non-2xx even though in-flight connections keep draining.
pub async fn health_check(State(state): State<ServerState>) -> Response {
    if state.is_draining() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "draining",
                "server": "RunAgent Local Server",
                "timestamp": Utc::now().to_rfc3339(),
                "version": crate::VERSION,
            })),
        )
            .into_response();
    }

    Json(json!({
        "status": "healthy",
        "server": "RunAgent Local Server",
        "timestamp": Utc::now().to_rfc3339(),
        "version": crate::VERSION,
    }))
    .into_response()
}

/// Architecture endpoint used by clients to validate entrypoints
pub async fn get_agent_architecture(
    State(state): State<ServerState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(block) = state.check_auth(&headers, None) {
        return envelope(StatusCode::UNAUTHORIZED, InvocationEnvelope::err(block));
    }

    if agent_id != state.agent_id {
        return envelope(StatusCode::NOT_FOUND, unknown_agent(&agent_id, &state));
    }

    let architecture = state.architecture();
    if architecture.entrypoints.is_empty() {
        return envelope(
            StatusCode::OK,
            InvocationEnvelope::err(
                ErrorBlock::new(
                    ErrorCode::ArchitectureMissing,
                    format!("Agent '{}' has no entrypoints configured", agent_id),
                )
                .with_suggestion("Declare entrypoints in runagent.config and reload"),
            ),
        );
    }

    match serde_json::to_value(&architecture) {
        Ok(data) => envelope(StatusCode::OK, InvocationEnvelope::ok(data)),
        Err(e) => envelope(
            StatusCode::OK,
            InvocationEnvelope::err(RunAgentError::from(e).error_block()),
        ),
    }
}

/// Unary run endpoint.
///
/// Protocol-level failures (auth, unknown agent, malformed body) use 4xx;
/// application-level failures ride a 200 with `success=false`.
pub async fn run_agent(
    State(state): State<ServerState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(block) = state.check_auth(&headers, None) {
        return envelope(StatusCode::UNAUTHORIZED, InvocationEnvelope::err(block));
    }

    if agent_id != state.agent_id {
        return envelope(StatusCode::NOT_FOUND, unknown_agent(&agent_id, &state));
    }

    let request: InvocationRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return envelope(
                StatusCode::BAD_REQUEST,
                InvocationEnvelope::err(
                    ErrorBlock::new(
                        ErrorCode::ValidationError,
                        format!("Malformed invocation request: {}", e),
                    )
                    .with_suggestion("Send a UTF-8 JSON body with an 'entrypoint_tag' field"),
                ),
            );
        }
    };

    tracing::debug!(
        "Running entrypoint '{}' for agent {}",
        request.entrypoint_tag,
        agent_id
    );

    match state.dispatcher.run(&request).await {
        // Result stays under the result_data nesting for SDK compatibility
        Ok(value) => envelope(
            StatusCode::OK,
            InvocationEnvelope::ok(json!({ "result_data": { "data": value } })),
        ),
        Err(e) => envelope(StatusCode::OK, InvocationEnvelope::err(e.error_block())),
    }
}

/// WebSocket upgrade for the streaming endpoint
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    Path(agent_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    // Auth runs after the upgrade so failures arrive as error frames
    let auth = state.check_auth(&headers, params.get("token").map(|s| s.as_str()));
    ws.on_upgrade(move |socket| handle_run_stream(socket, state, agent_id, auth))
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &StreamFrame,
) -> bool {
    match serde_json::to_string(frame) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode stream frame: {}", e);
            false
        }
    }
}

/// Drive one streaming invocation over one socket.
///
/// Frame order is strict: zero or one `error`, or `stream_started`, then
/// the data frames, then exactly one terminal frame. A client close stops
/// chunk consumption and suppresses all further frames.
async fn handle_run_stream(
    socket: WebSocket,
    state: ServerState,
    agent_id: String,
    auth: Result<(), ErrorBlock>,
) {
    let (mut sender, mut receiver) = socket.split();

    if let Err(block) = auth {
        send_frame(&mut sender, &StreamFrame::error(block)).await;
        let _ = sender.close().await;
        return;
    }

    if agent_id != state.agent_id {
        let block = ErrorBlock::new(
            ErrorCode::AgentNotFoundLocal,
            format!("Unknown agent '{}' at this server", agent_id),
        );
        send_frame(&mut sender, &StreamFrame::error(block)).await;
        let _ = sender.close().await;
        return;
    }

    // The first text frame carries the invocation request
    let request: InvocationRequest = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                Ok(request) => break request,
                Err(e) => {
                    let block = ErrorBlock::new(
                        ErrorCode::ValidationError,
                        format!("Malformed invocation request: {}", e),
                    );
                    send_frame(&mut sender, &StreamFrame::error(block)).await;
                    let _ = sender.close().await;
                    return;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!("WebSocket error before request frame: {}", e);
                return;
            }
        }
    };

    let mut stream = match state.dispatcher.open_stream(&request) {
        Ok(stream) => stream,
        Err(e) => {
            send_frame(&mut sender, &StreamFrame::error(e.error_block())).await;
            let _ = sender.close().await;
            return;
        }
    };

    if !send_frame(&mut sender, &StreamFrame::started()).await {
        return;
    }

    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(value)) => {
                    if !send_frame(&mut sender, &StreamFrame::data(value)).await {
                        break;
                    }
                }
                Some(Err(e)) => {
                    send_frame(&mut sender, &StreamFrame::error(e.error_block())).await;
                    break;
                }
                None => {
                    send_frame(&mut sender, &StreamFrame::completed()).await;
                    break;
                }
            },
            msg = receiver.next() => match msg {
                // Client closed: drop the producer, emit nothing further
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(
                        "Client closed stream for '{}', cancelling invocation",
                        request.entrypoint_tag
                    );
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }

    let _ = sender.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::callables::CallableRegistry;
    use crate::server::loader::ProjectLoader;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn state(auth_token: Option<&str>) -> (TempDir, ServerState) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("runagent.config.json"),
            json!({
                "agent_name": "math-agent",
                "framework": "default",
                "version": "1.0.0",
                "entrypoints": [{"tag": "solve", "file": "main.py", "module": "run"}]
            })
            .to_string(),
        )
        .unwrap();
        fs::write(temp_dir.path().join("main.py"), "...").unwrap();

        let mut registry = CallableRegistry::new();
        registry.register_fn("main.py", "run", |_args, _kwargs| async { Ok(json!("ok")) });
        let (config, resolved) = ProjectLoader::load(temp_dir.path(), &registry).unwrap();

        let state = ServerState {
            agent_id: "agent-1".to_string(),
            config,
            dispatcher: Arc::new(Dispatcher::new(resolved)),
            auth_token: auth_token.map(|s| s.to_string()),
            host: "127.0.0.1".to_string(),
            port: 8450,
            draining: Arc::new(AtomicBool::new(false)),
        };
        (temp_dir, state)
    }

    #[tokio::test]
    async fn test_health_goes_unavailable_while_draining() {
        let (_guard, state) = state(None);

        let healthy = health_check(State(state.clone())).await;
        assert_eq!(healthy.status(), StatusCode::OK);

        state.draining.store(true, Ordering::SeqCst);
        let draining = health_check(State(state)).await;
        assert_eq!(draining.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_auth_skipped_without_token() {
        let (_guard, state) = state(None);
        assert!(state.check_auth(&HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn test_auth_header_and_query_fallback() {
        let (_guard, state) = state(Some("secret"));

        let mut headers = HeaderMap::new();
        assert!(state.check_auth(&headers, None).is_err());

        headers.insert("authorization", "Bearer secret".parse().unwrap());
        assert!(state.check_auth(&headers, None).is_ok());

        headers.insert("authorization", "Bearer wrong".parse().unwrap());
        let err = state.check_auth(&headers, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);

        assert!(state.check_auth(&HeaderMap::new(), Some("secret")).is_ok());
    }

    #[test]
    fn test_architecture_payload() {
        let (_guard, state) = state(None);
        let architecture = state.architecture();
        assert_eq!(architecture.agent_id, "agent-1");
        assert_eq!(architecture.agent_name, "math-agent");
        assert_eq!(architecture.tags(), vec!["solve"]);
    }
}
