//! Structured-data serialization collaborator.
//!
//! Payload responses are encoded and structured request bodies decoded through
//! [`PayloadCodec`]; [`JsonCodec`] is the default.

use serde_json::Value;

pub trait PayloadCodec: Send + Sync {
    /// Media type written for encoded payloads.
    fn media_type(&self) -> &'static str;

    /// Whether a request `Content-Type` carries this codec's format.
    fn accepts(&self, content_type: &str) -> bool;

    fn encode(&self, value: &Value) -> anyhow::Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn media_type(&self) -> &'static str {
        "application/json"
    }

    fn accepts(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        essence == "application/json" || essence.ends_with("+json")
    }

    fn encode(&self, value: &Value) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
