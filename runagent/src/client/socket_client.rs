//! WebSocket client for streaming agent interactions

use crate::constants::API_PREFIX;
use crate::types::{
    InvocationRequest, RunAgentError, RunAgentResult, StreamFrame, StreamStatus,
};
use crate::utils::config::Config;
use crate::utils::serializer::CoreSerializer;
use futures::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// WebSocket client for agent streaming
#[derive(Debug)]
pub struct SocketClient {
    base_socket_url: String,
    api_key: Option<String>,
    api_prefix: String,
    serializer: CoreSerializer,
}

impl SocketClient {
    /// Create a new WebSocket client
    pub fn new(
        base_socket_url: &str,
        api_key: Option<String>,
        api_prefix: Option<&str>,
    ) -> RunAgentResult<Self> {
        let serializer = CoreSerializer::new(10.0)?;

        Ok(Self {
            base_socket_url: base_socket_url.trim_end_matches('/').to_string(),
            api_key,
            api_prefix: api_prefix.unwrap_or(API_PREFIX).to_string(),
            serializer,
        })
    }

    /// Create a default WebSocket client from the environment configuration
    pub fn from_env() -> RunAgentResult<Self> {
        let config = Config::load()?;
        let ws_url = http_to_ws_url(&config.base_url());
        Self::new(&ws_url, config.api_key(), Some(API_PREFIX))
    }

    fn get_websocket_url(&self, agent_id: &str) -> RunAgentResult<Url> {
        let path = format!("agents/{}/run-stream", agent_id);
        let mut full_url = format!("{}{}/{}", self.base_socket_url, self.api_prefix, path);

        // Token as a query parameter, for transports that cannot set headers
        if let Some(ref api_key) = self.api_key {
            full_url = format!("{}?token={}", full_url, api_key);
        }

        Url::parse(&full_url)
            .map_err(|e| RunAgentError::validation(format!("Invalid WebSocket URL: {}", e)))
    }

    /// Open a streaming invocation and return the chunk stream.
    ///
    /// Frames arrive strictly ordered: one `stream_started`, the data
    /// frames, then a terminal `stream_completed` or `error`. Dropping the
    /// returned stream closes the socket, which the server treats as
    /// cancellation.
    pub async fn run_stream(
        &self,
        agent_id: &str,
        request: &InvocationRequest,
    ) -> RunAgentResult<Pin<Box<dyn Stream<Item = RunAgentResult<Value>> + Send>>> {
        let url = self.get_websocket_url(agent_id)?;

        tracing::debug!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| RunAgentError::connection(format!("WebSocket connection failed: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        let request_text = serde_json::to_string(request)?;
        write
            .send(Message::Text(request_text))
            .await
            .map_err(|e| RunAgentError::connection(format!("Failed to send request: {}", e)))?;

        let serializer = self.serializer.clone();

        let stream = async_stream::stream! {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let frame: StreamFrame = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                yield Err(RunAgentError::server(format!(
                                    "Malformed stream frame: {}", e
                                )));
                                break;
                            }
                        };

                        match frame {
                            StreamFrame::Status { status: StreamStatus::StreamStarted } => continue,
                            StreamFrame::Status { status: StreamStatus::StreamCompleted } => break,
                            StreamFrame::Data { content } => {
                                yield Ok(serializer.decode_content(content));
                            }
                            StreamFrame::Error { error } => {
                                yield Err(RunAgentError::from_block(error));
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        yield Err(RunAgentError::connection(format!("WebSocket error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Convert an HTTP base URL into its WebSocket counterpart
pub fn http_to_ws_url(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_construction() {
        let client = SocketClient::new("ws://localhost:8000", None, Some("/api/v1")).unwrap();
        let url = client.get_websocket_url("test-agent").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:8000/api/v1/agents/test-agent/run-stream"
        );
    }

    #[test]
    fn test_token_query_fallback() {
        let client =
            SocketClient::new("ws://localhost:8000", Some("secret".to_string()), None).unwrap();
        let url = client.get_websocket_url("test-agent").unwrap();
        assert_eq!(url.query(), Some("token=secret"));
    }

    #[test]
    fn test_url_conversion() {
        assert_eq!(http_to_ws_url("http://localhost:8450"), "ws://localhost:8450");
        assert_eq!(http_to_ws_url("https://api.example.com"), "wss://api.example.com");
        assert_eq!(http_to_ws_url("localhost:8450"), "ws://localhost:8450");
    }
}
