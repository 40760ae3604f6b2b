//! # Wire Module
//!
//! Protobuf messages exchanged across the engine boundary, plus the base64 text
//! envelope queue transports carry them in.
//!
//! ```text
//! Request  { correlation_id, path, payload, source_channel_id, destination_channel_id }
//! Response { correlation_id, payload, error }
//! ```
//!
//! An empty `error` means success. Empty strings and absent fields are the same
//! thing on the wire, so encoding is stable across a decode/encode cycle.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use prost::Message;

use crate::ids::CorrelationId;

/// Request message.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub correlation_id: String,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(string, tag = "3")]
    pub payload: String,
    /// Channel the caller listens on for the response
    #[prost(string, tag = "4")]
    pub source_channel_id: String,
    #[prost(string, tag = "5")]
    pub destination_channel_id: String,
}

impl Request {
    #[must_use]
    pub fn new(path: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = id.to_string();
        self
    }
}

/// Response message.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct Response {
    #[prost(string, tag = "1")]
    pub correlation_id: String,
    #[prost(string, tag = "2")]
    pub payload: String,
    #[prost(string, tag = "3")]
    pub error: String,
}

impl Response {
    #[must_use]
    pub fn ok(correlation_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload: payload.into(),
            error: String::new(),
        }
    }

    #[must_use]
    pub fn failed(correlation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload: String::new(),
            error: error.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Split into the payload or the remote error text.
    pub fn into_result(self) -> Result<String, String> {
        if self.error.is_empty() {
            Ok(self.payload)
        } else {
            Err(self.error)
        }
    }
}

/// Wire decode error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Queue body is not valid base64
    Base64(String),
    /// Bytes are not a valid protobuf message
    Protobuf(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Base64(e) => write!(f, "invalid base64 body: {e}"),
            WireError::Protobuf(e) => write!(f, "invalid protobuf message: {e}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<prost::DecodeError> for WireError {
    fn from(e: prost::DecodeError) -> Self {
        WireError::Protobuf(e.to_string())
    }
}

impl From<base64::DecodeError> for WireError {
    fn from(e: base64::DecodeError) -> Self {
        WireError::Base64(e.to_string())
    }
}

#[must_use]
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

pub fn decode<M: Message + Default>(bytes: &[u8]) -> Result<M, WireError> {
    Ok(M::decode(bytes)?)
}

/// Serialize and base64-encode a message into a queue body.
#[must_use]
pub fn encode_body<M: Message>(message: &M) -> String {
    STANDARD.encode(message.encode_to_vec())
}

/// Decode a queue body produced by [`encode_body`].
pub fn decode_body<M: Message + Default>(body: &str) -> Result<M, WireError> {
    let bytes = STANDARD.decode(body.trim())?;
    decode(&bytes)
}
