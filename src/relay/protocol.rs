//! Wire message definitions
//!
//! Defines the JSON documents exchanged with the relay server. Inbound
//! messages are schemaless; the reply is a fixed-shape document that never
//! depends on the inbound content.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Status string carried by every reply
pub const STATUS_SUCCESS: &str = "success";

/// Message string carried by every reply
pub const RESPONSE_MESSAGE: &str = "Processed by FastAPI";

/// Constant key carried by every reply, never derived from input
pub const DEFAULT_KEY: u64 = 4_000_000;

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// One JSON document received from the relay server
///
/// No schema is enforced; the payload is parsed, logged, and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage(pub Value);

impl InboundMessage {
    /// Parse an inbound message from raw JSON text
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }
}

/// The fixed-shape reply sent for every inbound message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundResponse {
    /// Always [`STATUS_SUCCESS`]
    pub status: String,
    /// Constant payload
    pub data: ResponseData,
}

/// Payload of the fixed reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseData {
    /// Always [`RESPONSE_MESSAGE`]
    pub message: String,
    /// Always [`DEFAULT_KEY`]
    #[serde(rename = "defaultKey")]
    pub default_key: u64,
}

impl OutboundResponse {
    /// Construct the fixed reply
    pub fn fixed() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            data: ResponseData {
                message: RESPONSE_MESSAGE.to_string(),
                default_key: DEFAULT_KEY,
            },
        }
    }

    /// Serialize the reply to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
