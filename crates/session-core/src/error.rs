//! Error types for the session core

use thiserror::Error;

use crate::camera::CaptureError;
use crate::transport::TransportError;
use crate::types::SessionState;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by [`SessionManager`](crate::SessionManager)
///
/// Every variant is recoverable: after returning one of these the manager
/// is either back in `Idle` or in the state it was in before the call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Operation not permitted in the current lifecycle state
    #[error("Invalid state for {operation}: session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Unsupported configuration combination
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Malformed peer identifier, rejected before any transport call
    #[error("Invalid peer id '{input}': {reason}")]
    InvalidPeerId { input: String, reason: String },

    /// Transport-level negotiation or connectivity failure
    #[error("Connection to peer {peer_id} failed: {reason}")]
    ConnectionFailed { peer_id: i32, reason: String },

    /// Pending connection aborted by a disconnect or dispose
    #[error("Connection attempt to peer {peer_id} was cancelled")]
    Cancelled { peer_id: i32 },

    /// Camera acquisition failed while constructing the manager
    #[error("Camera error: {0}")]
    Camera(#[from] CaptureError),
}

impl SessionError {
    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection failure from a transport error
    pub fn connection_failed(peer_id: i32, source: &TransportError) -> Self {
        Self::ConnectionFailed {
            peer_id,
            reason: source.to_string(),
        }
    }

    /// Whether the failure came from the transport rather than the caller
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }
}
