//! REST client for HTTP API interactions

use crate::constants::API_PREFIX;
use crate::types::{
    AgentArchitecture, ErrorBlock, ErrorCode, InvocationEnvelope, InvocationRequest,
    RunAgentError, RunAgentResult,
};
use crate::utils::config::Config;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// REST client for API interactions
#[derive(Debug)]
pub struct RestClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_prefix: String,
}

impl RestClient {
    /// Create a new REST client with custom configuration
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        api_prefix: Option<&str>,
    ) -> RunAgentResult<Self> {
        // Outlive the longest allowed agent execution
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .user_agent(format!("RunAgent-Rust-SDK/{}", crate::VERSION))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let api_prefix = api_prefix.unwrap_or(API_PREFIX).to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            api_prefix,
        })
    }

    /// Create a default REST client from the environment configuration
    pub fn from_env() -> RunAgentResult<Self> {
        let config = Config::load()?;
        Self::new(&config.base_url(), config.api_key(), Some(API_PREFIX))
    }

    fn get_url(&self, path: &str) -> RunAgentResult<Url> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let full_path = format!("{}{}/{}", self.base_url, self.api_prefix, path);
        Url::parse(&full_path)
            .map_err(|e| RunAgentError::validation(format!("Invalid URL: {}", e)))
    }

    async fn handle_response(&self, response: Response) -> RunAgentResult<Value> {
        let status = response.status();

        if status.is_success() {
            let json: Value = response.json().await?;
            return Ok(json);
        }

        let error_text = response.text().await.unwrap_or_default();

        // Servers answer protocol failures with the envelope too; surface
        // its error block verbatim when present
        if let Ok(envelope) = serde_json::from_str::<InvocationEnvelope>(&error_text) {
            if let Some(block) = envelope.error {
                return Err(RunAgentError::from_block(block));
            }
        }

        let message = if error_text.is_empty() {
            format!("HTTP error {}", status)
        } else {
            error_text
        };

        match status.as_u16() {
            401 => Err(RunAgentError::authentication(message)),
            403 => Err(RunAgentError::execution(
                ErrorCode::PermissionError,
                format!("Access denied: {}", message),
                Some(
                    "Check that the agent belongs to your account and your API key has access"
                        .to_string(),
                ),
                None,
            )),
            400 | 422 => Err(RunAgentError::validation(message)),
            404 => Err(RunAgentError::execution(
                ErrorCode::AgentNotFoundRemote,
                format!("Not found: {}", message),
                Some(format!(
                    "Check the agent id and that the base URL ({}) is correct",
                    self.base_url
                )),
                None,
            )),
            500..=599 => Err(RunAgentError::server(format!("Server error: {}", message))),
            _ => Err(RunAgentError::connection(message)),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        data: Option<&Value>,
    ) -> RunAgentResult<Value> {
        let url = self.get_url(path)?;
        let mut request_builder = self.client.request(method, url);

        if let Some(data) = data {
            request_builder = request_builder
                .header("Content-Type", "application/json")
                .json(data);
        }

        if let Some(ref api_key) = self.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| RunAgentError::connection(format!("Request failed: {}", e)))?;
        self.handle_response(response).await
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> RunAgentResult<Value> {
        self.request(Method::GET, path, None).await
    }

    /// Send a POST request
    pub async fn post(&self, path: &str, data: &Value) -> RunAgentResult<Value> {
        self.request(Method::POST, path, Some(data)).await
    }

    /// Run an agent entrypoint and return the response envelope
    pub async fn run_agent(
        &self,
        agent_id: &str,
        request: &InvocationRequest,
    ) -> RunAgentResult<InvocationEnvelope> {
        let path = format!("agents/{}/run", agent_id);
        tracing::debug!(
            "Running agent {} entrypoint '{}' at {}{}",
            agent_id,
            request.entrypoint_tag,
            self.base_url,
            self.api_prefix
        );

        let body = serde_json::to_value(request)?;
        let response = self.post(&path, &body).await?;

        serde_json::from_value(response).map_err(|e| {
            RunAgentError::server(format!("Malformed response envelope: {}", e))
        })
    }

    /// Fetch and validate the agent's architecture
    pub async fn get_agent_architecture(
        &self,
        agent_id: &str,
    ) -> RunAgentResult<AgentArchitecture> {
        let path = format!("agents/{}/architecture", agent_id);
        let response = self.get(&path).await?;

        let envelope: InvocationEnvelope = serde_json::from_value(response).map_err(|e| {
            RunAgentError::server(format!("Malformed architecture envelope: {}", e))
        })?;

        if !envelope.success {
            let block = envelope.error.unwrap_or_else(|| {
                ErrorBlock::new(
                    ErrorCode::UnknownError,
                    "Failed to retrieve agent architecture",
                )
            });
            return Err(RunAgentError::from_block(block));
        }

        let data = envelope.data.ok_or_else(|| {
            RunAgentError::execution(
                ErrorCode::ArchitectureMissing,
                "Architecture response carries no data",
                Some("Redeploy the agent or ensure entrypoints are configured".to_string()),
                None,
            )
        })?;

        serde_json::from_value(data).map_err(|e| {
            RunAgentError::execution(
                ErrorCode::ArchitectureMissing,
                format!("Architecture payload is malformed: {}", e),
                Some("Redeploy the agent or ensure entrypoints are configured".to_string()),
                None,
            )
        })
    }

    /// Health check
    pub async fn health_check(&self) -> RunAgentResult<Value> {
        self.get("health").await
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
