//! JSON envelope of a relay frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// One websocket text frame.
///
/// Events carry positional arguments. An event that expects an answer sets
/// `ackId`, and the peer replies with an `ack` frame carrying the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
    #[serde(rename_all = "camelCase")]
    Event {
        name: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack_id: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Ack {
        ack_id: u64,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Frame {
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            name: name.into(),
            args,
            ack_id: None,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Truthiness as the relay understands it: `false`, `null`, `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
