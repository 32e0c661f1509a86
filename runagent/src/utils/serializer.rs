//! Payload normalization for the wire contract
//!
//! Servers have emitted unary results both flat under `data` and nested
//! under `data.result_data.data`; stream chunks arrive either as strings or
//! structured values. The serializer gives clients one place that tolerates
//! all of it.

use crate::types::RunAgentResult;
use serde_json::Value;

/// Core serializer for decoding wire payloads
#[derive(Debug, Clone)]
pub struct CoreSerializer {
    max_size_bytes: usize,
}

impl CoreSerializer {
    /// Create a new CoreSerializer with the given size limit
    pub fn new(max_size_mb: f64) -> RunAgentResult<Self> {
        Ok(Self {
            max_size_bytes: (max_size_mb * 1024.0 * 1024.0) as usize,
        })
    }

    /// Extract the unary result from an envelope's `data` field.
    ///
    /// Accepts both the flat shape and the legacy
    /// `data.result_data.data` nesting.
    pub fn extract_result(&self, data: Value) -> Value {
        if let Some(nested) = data
            .get("result_data")
            .and_then(|result_data| result_data.get("data"))
        {
            return nested.clone();
        }
        data
    }

    /// Decode a stream frame's `content`.
    ///
    /// Structured interpretation first: a string that parses as JSON becomes
    /// the parsed value, anything else passes through unchanged.
    pub fn decode_content(&self, content: Value) -> Value {
        if let Some(text) = content.as_str() {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                return parsed;
            }
        }
        content
    }

    /// Check if serialized data fits the size limit
    pub fn check_size_limit(&self, json_str: &str) -> bool {
        json_str.len() <= self.max_size_bytes
    }

    /// Serialize a value, warning when it exceeds the size limit
    pub fn serialize_value(&self, value: &Value) -> RunAgentResult<String> {
        let json_str = serde_json::to_string(value)?;

        if !self.check_size_limit(&json_str) {
            tracing::warn!(
                "Serialized payload exceeds size limit: {} bytes",
                json_str.len()
            );
        }

        Ok(json_str)
    }
}
