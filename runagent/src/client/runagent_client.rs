//! Main RunAgent client for interacting with deployed agents

use crate::client::rest_client::RestClient;
use crate::client::socket_client::{http_to_ws_url, SocketClient};
use crate::constants::{
    DEFAULT_BASE_URL, ENV_RUNAGENT_API_KEY, ENV_RUNAGENT_BASE_URL,
};
use crate::types::{
    is_streaming_tag, AgentArchitecture, ErrorBlock, ErrorCode, InvocationRequest, RunAgentError,
    RunAgentResult,
};
use crate::utils::config::resolve_setting;
use crate::utils::serializer::CoreSerializer;
use futures::Stream;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::pin::Pin;

#[cfg(feature = "db")]
use crate::db::DatabaseService;

/// Connection parameters for [`RunAgentClient`].
///
/// Every omitted setting falls back with the same precedence: explicit
/// argument, then environment variable, then library default.
#[derive(Debug, Clone, Default)]
pub struct RunAgentClientConfig {
    pub agent_id: String,
    pub entrypoint_tag: String,
    pub local: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Opaque metadata kept client-side; never transmitted
    pub extra_params: HashMap<String, Value>,
}

impl RunAgentClientConfig {
    pub fn new<A: Into<String>, T: Into<String>>(agent_id: A, entrypoint_tag: T) -> Self {
        Self {
            agent_id: agent_id.into(),
            entrypoint_tag: entrypoint_tag.into(),
            ..Self::default()
        }
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_address<H: Into<String>>(mut self, host: H, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_extra_params(mut self, extra_params: HashMap<String, Value>) -> Self {
        self.extra_params = extra_params;
        self
    }
}

/// Client for one agent entrypoint, unary or streaming
#[derive(Debug)]
pub struct RunAgentClient {
    agent_id: String,
    entrypoint_tag: String,
    local: bool,
    extra_params: HashMap<String, Value>,
    rest_client: RestClient,
    socket_client: SocketClient,
    serializer: CoreSerializer,
    architecture: Option<AgentArchitecture>,
}

impl RunAgentClient {
    /// Create a new client, resolving the target address and validating the
    /// configured entrypoint against the agent's architecture.
    pub async fn new(config: RunAgentClientConfig) -> RunAgentResult<Self> {
        if config.agent_id.is_empty() || config.entrypoint_tag.is_empty() {
            return Err(RunAgentError::validation(
                "agent_id and entrypoint_tag are required",
            ));
        }

        let api_key = resolve_setting(config.api_key.clone(), ENV_RUNAGENT_API_KEY, None);
        let base_url = resolve_setting(config.base_url.clone(), ENV_RUNAGENT_BASE_URL, None)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let local = config.local.unwrap_or(false);

        let (rest_client, socket_client) = if local {
            let (host, port) = Self::resolve_local_address(&config).await?;
            tracing::debug!("Using local agent address {}:{}", host, port);

            let http_url = format!("http://{}:{}", host, port);
            let ws_url = format!("ws://{}:{}", host, port);
            (
                RestClient::new(&http_url, api_key.clone(), None)?,
                SocketClient::new(&ws_url, api_key, None)?,
            )
        } else {
            let ws_url = http_to_ws_url(&base_url);
            (
                RestClient::new(&base_url, api_key.clone(), None)?,
                SocketClient::new(&ws_url, api_key, None)?,
            )
        };

        let mut client = Self {
            agent_id: config.agent_id,
            entrypoint_tag: config.entrypoint_tag,
            local,
            extra_params: config.extra_params,
            rest_client,
            socket_client,
            serializer: CoreSerializer::new(10.0)?,
            architecture: None,
        };

        client.architecture = client.validate_entrypoint().await?;
        Ok(client)
    }

    /// Resolve host and port for a local agent: explicit overrides first,
    /// then the registry file when available.
    async fn resolve_local_address(
        config: &RunAgentClientConfig,
    ) -> RunAgentResult<(String, u16)> {
        if let (Some(host), Some(port)) = (&config.host, config.port) {
            return Ok((host.clone(), port));
        }

        #[cfg(feature = "db")]
        {
            let db_service = DatabaseService::new(None).await?;
            if let Some((host, port)) = db_service.get_agent_address(&config.agent_id).await? {
                tracing::debug!(
                    "Resolved agent {} to {}:{} via local registry",
                    config.agent_id,
                    host,
                    port
                );
                return Ok((host, port));
            }

            return Err(RunAgentError::execution(
                ErrorCode::AgentNotFoundLocal,
                format!("Agent '{}' not found in the local registry", config.agent_id),
                Some("Start the agent server, or pass host and port explicitly".to_string()),
                None,
            ));
        }

        #[cfg(not(feature = "db"))]
        {
            return Err(RunAgentError::validation(
                "Local discovery is unavailable without the 'db' feature; pass host and port explicitly",
            ));
        }
    }

    /// Fetch the architecture and check the configured tag is served.
    ///
    /// A transport failure only logs; address-level problems and a missing
    /// tag are hard errors.
    async fn validate_entrypoint(&self) -> RunAgentResult<Option<AgentArchitecture>> {
        let architecture = match self.rest_client.get_agent_architecture(&self.agent_id).await {
            Ok(architecture) => architecture,
            Err(e) if matches!(e.category(), "connection" | "http") => {
                tracing::warn!(
                    "Could not fetch architecture for agent {}: {}",
                    self.agent_id,
                    e
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let tags = architecture.tags();
        if !tags.iter().any(|tag| tag == &self.entrypoint_tag) {
            return Err(RunAgentError::execution(
                ErrorCode::EntrypointNotFound,
                format!(
                    "Entrypoint '{}' not found in agent {}",
                    self.entrypoint_tag, self.agent_id
                ),
                Some(format!("Available tags: {}", tags.join(", "))),
                None,
            ));
        }

        Ok(Some(architecture))
    }

    /// Client-side guardrail: `run()` refuses streaming tags
    fn ensure_unary(entrypoint_tag: &str) -> RunAgentResult<()> {
        if is_streaming_tag(entrypoint_tag) {
            return Err(RunAgentError::execution(
                ErrorCode::StreamEntrypoint,
                format!("Entrypoint '{}' is a streaming entrypoint", entrypoint_tag),
                Some("Use run_stream() for streaming entrypoints".to_string()),
                None,
            ));
        }
        Ok(())
    }

    /// Client-side guardrail: `run_stream()` refuses unary tags
    fn ensure_streaming(entrypoint_tag: &str) -> RunAgentResult<()> {
        if !is_streaming_tag(entrypoint_tag) {
            return Err(RunAgentError::execution(
                ErrorCode::NonStreamEntrypoint,
                format!("Entrypoint '{}' is not a streaming entrypoint", entrypoint_tag),
                Some("Use run() for non-streaming entrypoints".to_string()),
                None,
            ));
        }
        Ok(())
    }

    fn build_request(&self, input_args: &[Value], input_kwargs: &[(&str, Value)]) -> InvocationRequest {
        let kwargs: Map<String, Value> = input_kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        InvocationRequest::new(self.entrypoint_tag.clone())
            .with_args(input_args.to_vec())
            .with_kwargs(kwargs)
    }

    /// Run the agent with keyword arguments only
    pub async fn run(&self, input_kwargs: &[(&str, Value)]) -> RunAgentResult<Value> {
        self.run_with_args(&[], input_kwargs).await
    }

    /// Run the agent with both positional and keyword arguments
    pub async fn run_with_args(
        &self,
        input_args: &[Value],
        input_kwargs: &[(&str, Value)],
    ) -> RunAgentResult<Value> {
        Self::ensure_unary(&self.entrypoint_tag)?;

        let request = self.build_request(input_args, input_kwargs);
        let envelope = self.rest_client.run_agent(&self.agent_id, &request).await?;

        if envelope.success {
            Ok(self
                .serializer
                .extract_result(envelope.data.unwrap_or(Value::Null)))
        } else {
            let block = envelope.error.unwrap_or_else(|| {
                ErrorBlock::new(ErrorCode::UnknownError, "Agent run failed without detail")
            });
            Err(RunAgentError::from_block(block))
        }
    }

    /// Run the agent and return a stream of chunks
    pub async fn run_stream(
        &self,
        input_kwargs: &[(&str, Value)],
    ) -> RunAgentResult<Pin<Box<dyn Stream<Item = RunAgentResult<Value>> + Send>>> {
        self.run_stream_with_args(&[], input_kwargs).await
    }

    /// Run the agent with streaming and both positional and keyword arguments
    pub async fn run_stream_with_args(
        &self,
        input_args: &[Value],
        input_kwargs: &[(&str, Value)],
    ) -> RunAgentResult<Pin<Box<dyn Stream<Item = RunAgentResult<Value>> + Send>>> {
        Self::ensure_streaming(&self.entrypoint_tag)?;

        let request = self.build_request(input_args, input_kwargs);
        self.socket_client.run_stream(&self.agent_id, &request).await
    }

    /// Get the agent's architecture information
    pub async fn get_agent_architecture(&self) -> RunAgentResult<AgentArchitecture> {
        self.rest_client.get_agent_architecture(&self.agent_id).await
    }

    /// Check if the agent is available
    pub async fn health_check(&self) -> RunAgentResult<bool> {
        Ok(self.rest_client.health_check().await.is_ok())
    }

    /// Get agent id
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Get entrypoint tag
    pub fn entrypoint_tag(&self) -> &str {
        &self.entrypoint_tag
    }

    /// Check if using local deployment
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Opaque constructor metadata; stored, never transmitted
    pub fn extra_params(&self) -> &HashMap<String, Value> {
        &self.extra_params
    }

    /// The architecture fetched at construction, if the fetch succeeded
    pub fn architecture(&self) -> Option<&AgentArchitecture> {
        self.architecture.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_builder() {
        let mut extra = HashMap::new();
        extra.insert("trace_id".to_string(), json!("t-1"));

        let config = RunAgentClientConfig::new("agent-1", "solve")
            .with_local(true)
            .with_address("127.0.0.1", 8450)
            .with_api_key("key")
            .with_base_url("http://localhost:8330")
            .with_extra_params(extra);

        assert_eq!(config.agent_id, "agent-1");
        assert_eq!(config.entrypoint_tag, "solve");
        assert_eq!(config.local, Some(true));
        assert_eq!(config.port, Some(8450));
        assert_eq!(config.extra_params.get("trace_id"), Some(&json!("t-1")));
    }

    #[test]
    fn test_guardrails_fire_before_any_network_io() {
        let err = RunAgentClient::ensure_unary("gen_stream").unwrap_err();
        assert_eq!(err.code(), ErrorCode::StreamEntrypoint);

        let err = RunAgentClient::ensure_streaming("solve").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NonStreamEntrypoint);

        assert!(RunAgentClient::ensure_unary("solve").is_ok());
        assert!(RunAgentClient::ensure_streaming("gen_stream").is_ok());
        // The suffix rule is literal
        assert!(RunAgentClient::ensure_streaming("_stream").is_ok());
    }

    #[tokio::test]
    async fn test_empty_identifiers_rejected() {
        let err = RunAgentClient::new(RunAgentClientConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[cfg(all(feature = "server", feature = "db"))]
    mod e2e {
        use super::*;
        use crate::db::DatabaseService;
        use crate::server::{CallableRegistry, LocalServer};
        use futures::StreamExt;
        use std::fs;
        use std::sync::Arc;
        use std::time::Duration;
        use tempfile::TempDir;

        async fn start_server() -> (TempDir, TempDir, String, u16, crate::server::ShutdownHandle) {
            let project = TempDir::new().unwrap();
            fs::write(
                project.path().join("runagent.config.json"),
                json!({
                    "agent_name": "math-agent",
                    "framework": "default",
                    "version": "1.0.0",
                    "entrypoints": [
                        {"tag": "solve", "file": "main.py", "module": "run"},
                        {"tag": "gen_stream", "file": "main.py", "module": "run_stream"}
                    ]
                })
                .to_string(),
            )
            .unwrap();
            fs::write(project.path().join("main.py"), "...").unwrap();

            let mut registry = CallableRegistry::new();
            registry.register_fn("main.py", "run", |_args, kwargs| async move {
                let q = kwargs.get("q").and_then(|v| v.as_str()).unwrap_or_default();
                Ok(json!(format!("ok:{}", q)))
            });
            registry.register_stream_fn("main.py", "run_stream", |_args, _kwargs| {
                futures::stream::iter(vec![Ok(json!("a")), Ok(json!("b")), Ok(json!("c"))])
            });

            let db_dir = TempDir::new().unwrap();
            let db_service = Arc::new(
                DatabaseService::new(Some(db_dir.path().join("registry.db")))
                    .await
                    .unwrap(),
            );

            let server = LocalServer::new(
                "agent-client-e2e".to_string(),
                project.path().to_path_buf(),
                &registry,
                "127.0.0.1",
                0,
            )
            .await
            .unwrap()
            .with_db_service(db_service.clone());

            let agent_id = server.agent_id().to_string();
            let handle = server.shutdown_handle();
            tokio::spawn(server.start());

            let mut port = 0u16;
            for _ in 0..100 {
                if let Some(record) = db_service.get_agent(&agent_id).await.unwrap() {
                    if record.agent_status() == crate::db::AgentStatus::Running && record.port != 0
                    {
                        port = record.port as u16;
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            assert_ne!(port, 0);

            (project, db_dir, agent_id, port, handle)
        }

        #[tokio::test]
        async fn test_client_unary_round_trip() {
            let (_p, _d, agent_id, port, handle) = start_server().await;

            let client = RunAgentClient::new(
                RunAgentClientConfig::new(agent_id.clone(), "solve")
                    .with_local(true)
                    .with_address("127.0.0.1", port),
            )
            .await
            .unwrap();

            // The legacy result nesting is unwrapped transparently
            let result = client.run(&[("q", json!("hi"))]).await.unwrap();
            assert_eq!(result, json!("ok:hi"));
            assert!(client.architecture().is_some());

            handle.shutdown();
        }

        #[tokio::test]
        async fn test_client_streaming_round_trip() {
            let (_p, _d, agent_id, port, handle) = start_server().await;

            let client = RunAgentClient::new(
                RunAgentClientConfig::new(agent_id.clone(), "gen_stream")
                    .with_local(true)
                    .with_address("127.0.0.1", port),
            )
            .await
            .unwrap();

            let stream = client.run_stream(&[]).await.unwrap();
            let chunks: Vec<Value> = stream.map(|chunk| chunk.unwrap()).collect().await;
            assert_eq!(chunks, vec![json!("a"), json!("b"), json!("c")]);

            handle.shutdown();
        }

        #[tokio::test]
        async fn test_client_rejects_unknown_tag_at_construction() {
            let (_p, _d, agent_id, port, handle) = start_server().await;

            let err = RunAgentClient::new(
                RunAgentClientConfig::new(agent_id.clone(), "missing_tag")
                    .with_local(true)
                    .with_address("127.0.0.1", port),
            )
            .await
            .unwrap_err();

            assert_eq!(err.code(), ErrorCode::EntrypointNotFound);
            let suggestion = err.error_block().suggestion.unwrap();
            assert!(suggestion.contains("solve"));
            assert!(suggestion.contains("gen_stream"));

            handle.shutdown();
        }
    }
}
