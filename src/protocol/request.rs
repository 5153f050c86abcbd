//! Envelope, Request and Response message types.
//!
//! Defines the frame format for correlated requests and their responses.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Command;

// ============================================================================
// Envelope
// ============================================================================

/// Channel-scoped wrapper around every frame.
///
/// # Format
///
/// ```json
/// { "channel": "wallet-bridge-communication-channel", "message": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Channel name shared by both endpoints.
    pub channel: String,

    /// Wrapped request or response.
    pub message: T,
}

impl<T> Envelope<T> {
    /// Wraps a message for the named channel.
    #[inline]
    #[must_use]
    pub fn new(channel: impl Into<String>, message: T) -> Self {
        Self {
            channel: channel.into(),
            message,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// A correlated request from the local end to the remote window.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "method": "transaction",
///   "params": { "txn": { ... } }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }

    /// Creates a new request with specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, command: Command) -> Self {
        Self { id, command }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the remote window.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "status": "success", "data": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "status": "error", "message": "User rejected" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Response status.
    pub status: ResponseStatus,

    /// Human readable message (mostly on error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Result data (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, data: Option<Value>) -> Self {
        Self {
            id,
            status: ResponseStatus::Success,
            message: None,
            data,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            status: ResponseStatus::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Extracts the data value, returning error if the response was an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] carrying the remote message.
    pub fn into_result(self) -> Result<Value> {
        match self.status {
            ResponseStatus::Success => Ok(self.data.unwrap_or(Value::Null)),
            ResponseStatus::Error => Err(Error::remote(
                self.message.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }

    /// Gets a boolean value from the data.
    ///
    /// Returns false if key not found or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.data
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_bool)
            .unwrap_or_default()
    }
}

/// Deserializes a required field of a response data object.
///
/// # Errors
///
/// - [`Error::Protocol`] if the field is missing
/// - [`Error::Json`] if the field has the wrong shape
pub fn data_field<T: DeserializeOwned>(data: &Value, key: &str) -> Result<T> {
    let value = data
        .get(key)
        .ok_or_else(|| Error::protocol(format!("Expected `{key}` in response data")))?;
    Ok(T::deserialize(value)?)
}

// ============================================================================
// ResponseStatus
// ============================================================================

/// Response status discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// InboundRequest
// ============================================================================

/// A peer-initiated message received on the channel.
///
/// The remote window uses these for update pushes. A request carrying an
/// `id` may be answered by the registered handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    /// Correlation ID chosen by the peer, if it expects a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name.
    pub method: String,

    /// Method params.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl InboundRequest {
    /// Builds a success reply, or `None` if the peer did not ask for one.
    #[must_use]
    pub fn reply_success(&self, data: Option<Value>) -> Option<Response> {
        self.id.map(|id| Response::success(id, data))
    }

    /// Builds an error reply, or `None` if the peer did not ask for one.
    #[must_use]
    pub fn reply_error(&self, message: impl Into<String>) -> Option<Response> {
        self.id.map(|id| Response::error(id, message))
    }
}

// ============================================================================
// Message
// ============================================================================

/// Any valid inbound message.
///
/// A frame with `id` and a valid `status` is a [`Response`]; otherwise a frame
/// with a `method` is an [`InboundRequest`]. Anything else is not a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Response to one of our requests.
    Response(Response),
    /// Peer-initiated request.
    Request(InboundRequest),
}

impl Message {
    /// Parses an inbound value, returning `None` for invalid shapes.
    #[must_use]
    pub fn parse(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
