//! Wire and configuration schema types for the RunAgent SDK

use crate::constants::{DEFAULT_TIMEOUT_SECONDS, STREAM_TAG_SUFFIX};
use crate::types::errors::ErrorBlock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// True when the tag selects a streaming entrypoint.
///
/// The suffix rule is literal: a tag that is exactly `_stream` streams.
pub fn is_streaming_tag(tag: &str) -> bool {
    tag.ends_with(STREAM_TAG_SUFFIX)
}

/// Entrypoint declaration from the project config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointSpec {
    /// Tag addressing this entrypoint; unique within a project
    pub tag: String,
    /// Source file, relative to the project root
    pub file: String,
    /// Name of the callable within that file
    pub module: String,
    /// Opaque extractor metadata, stored but not interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<Value>,
}

impl EntrypointSpec {
    pub fn is_streaming(&self) -> bool {
        is_streaming_tag(&self.tag)
    }
}

/// Declarative project configuration (`runagent.config.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub agent_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Framework tag, free-form (e.g. `langgraph`)
    pub framework: String,
    pub version: String,
    pub entrypoints: Vec<EntrypointSpec>,
}

/// Architecture payload served to clients for entrypoint validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentArchitecture {
    pub agent_id: String,
    pub agent_name: String,
    pub framework: String,
    pub version: String,
    pub entrypoints: Vec<EntrypointSpec>,
}

impl AgentArchitecture {
    pub fn tags(&self) -> Vec<String> {
        self.entrypoints.iter().map(|ep| ep.tag.clone()).collect()
    }
}

fn default_timeout_seconds() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Request envelope shared by the unary and streaming endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub entrypoint_tag: String,
    #[serde(default)]
    pub input_args: Vec<Value>,
    #[serde(default)]
    pub input_kwargs: Map<String, Value>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    /// Reserved for future use; parsed and ignored
    #[serde(default)]
    pub async_execution: bool,
}

impl InvocationRequest {
    pub fn new<S: Into<String>>(entrypoint_tag: S) -> Self {
        Self {
            entrypoint_tag: entrypoint_tag.into(),
            input_args: Vec::new(),
            input_kwargs: Map::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            async_execution: false,
        }
    }

    pub fn with_args(mut self, input_args: Vec<Value>) -> Self {
        self.input_args = input_args;
        self
    }

    pub fn with_kwargs(mut self, input_kwargs: Map<String, Value>) -> Self {
        self.input_kwargs = input_kwargs;
        self
    }
}

/// Response envelope for HTTP responses and the architecture endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl InvocationEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn err(error: ErrorBlock) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            message: None,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Stream lifecycle markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    StreamStarted,
    StreamCompleted,
}

/// Typed WebSocket frame, discriminated on `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Status { status: StreamStatus },
    Data { content: Value },
    Error { error: ErrorBlock },
}

impl StreamFrame {
    pub fn started() -> Self {
        Self::Status {
            status: StreamStatus::StreamStarted,
        }
    }

    pub fn completed() -> Self {
        Self::Status {
            status: StreamStatus::StreamCompleted,
        }
    }

    pub fn data(content: Value) -> Self {
        Self::Data { content }
    }

    pub fn error(error: ErrorBlock) -> Self {
        Self::Error { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::errors::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_streaming_tag_rule() {
        assert!(is_streaming_tag("generic_stream"));
        assert!(!is_streaming_tag("generic"));
        // The suffix rule is literal
        assert!(is_streaming_tag("_stream"));
        assert!(!is_streaming_tag("streamer"));
    }

    #[test]
    fn test_request_defaults() {
        let req: InvocationRequest =
            serde_json::from_str(r#"{"entrypoint_tag": "solve"}"#).unwrap();
        assert_eq!(req.entrypoint_tag, "solve");
        assert!(req.input_args.is_empty());
        assert!(req.input_kwargs.is_empty());
        assert_eq!(req.timeout_seconds, 300);
        assert!(!req.async_execution);
    }

    #[test]
    fn test_request_ignores_unknown_fields() {
        let req: InvocationRequest = serde_json::from_str(
            r#"{"entrypoint_tag": "solve", "id": "run_start", "trace": {"span": 1}}"#,
        )
        .unwrap();
        assert_eq!(req.entrypoint_tag, "solve");
    }

    #[test]
    fn test_envelope_totality() {
        let ok = InvocationEnvelope::ok(json!({"answer": 42}));
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert!(!ok.request_id.is_empty());

        let err = InvocationEnvelope::err(ErrorBlock::new(
            ErrorCode::EntrypointNotFound,
            "Unknown entrypoint 'foo_stream'",
        ));
        assert!(!err.success);
        assert!(err.data.is_none());
        assert_eq!(
            err.error.as_ref().unwrap().code,
            ErrorCode::EntrypointNotFound
        );
    }

    #[test]
    fn test_stream_frame_wire_shape() {
        let started = serde_json::to_value(StreamFrame::started()).unwrap();
        assert_eq!(
            started,
            json!({"type": "status", "status": "stream_started"})
        );

        let data = serde_json::to_value(StreamFrame::data(json!("a"))).unwrap();
        assert_eq!(data, json!({"type": "data", "content": "a"}));

        let frame: StreamFrame = serde_json::from_value(
            json!({"type": "error", "error": {"code": "TIMEOUT", "message": "idle too long"}}),
        )
        .unwrap();
        match frame {
            StreamFrame::Error { error } => assert_eq!(error.code, ErrorCode::Timeout),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_architecture_tags() {
        let arch = AgentArchitecture {
            agent_id: "a1".to_string(),
            agent_name: "demo".to_string(),
            framework: "langgraph".to_string(),
            version: "1.0.0".to_string(),
            entrypoints: vec![
                EntrypointSpec {
                    tag: "solve".to_string(),
                    file: "main.py".to_string(),
                    module: "run".to_string(),
                    extractor: None,
                },
                EntrypointSpec {
                    tag: "gen_stream".to_string(),
                    file: "main.py".to_string(),
                    module: "run_stream".to_string(),
                    extractor: None,
                },
            ],
        };
        assert_eq!(arch.tags(), vec!["solve", "gen_stream"]);
        assert!(arch.entrypoints[1].is_streaming());
    }
}
