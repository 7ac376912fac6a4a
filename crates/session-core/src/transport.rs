//! Media transport abstraction
//!
//! The session manager never talks to a WebRTC stack directly. It drives
//! whatever implements [`MediaSession`]; signaling, SDP exchange and ICE are
//! the implementation's business.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{MediaHandle, MediaSourceKind, PeerId, RemoteSurface, TransceiverDirection};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors reported by a [`MediaSession`] implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The media session could not be opened
    #[error("Failed to open media session: {reason}")]
    OpenFailed { reason: String },

    /// The remote peer could not be reached
    #[error("Peer {peer_id} is unreachable")]
    PeerUnreachable { peer_id: PeerId },

    /// Offer/answer negotiation did not complete
    #[error("Negotiation failed: {reason}")]
    NegotiationFailed { reason: String },

    /// Negotiation did not complete within the configured deadline
    #[error("Negotiation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Remote rendering could not be attached
    #[error("Failed to bind remote render target: {reason}")]
    RenderBindFailed { reason: String },

    /// The handle is not known to the transport
    #[error("Unknown media handle {handle}")]
    UnknownHandle { handle: MediaHandle },
}

/// Operations the session manager needs from the native media stack
///
/// Calls for one handle are never issued concurrently. `close` is called
/// exactly once for every handle `open` returned.
#[async_trait]
pub trait MediaSession: Send + Sync + std::fmt::Debug {
    /// Open a media session with the given capture source and direction
    async fn open(
        &self,
        source_kind: MediaSourceKind,
        direction: TransceiverDirection,
    ) -> TransportResult<MediaHandle>;

    /// Establish connectivity with `peer` and negotiate media parameters
    ///
    /// The future may be dropped before completion when the attempt is
    /// cancelled; `close` follows in that case.
    async fn negotiate(&self, handle: MediaHandle, peer: PeerId) -> TransportResult<()>;

    /// Render incoming video into `surface` once media flows
    async fn bind_remote_render(
        &self,
        handle: MediaHandle,
        surface: &RemoteSurface,
    ) -> TransportResult<()>;

    /// Release the transceivers and everything else tied to `handle`
    async fn close(&self, handle: MediaHandle) -> TransportResult<()>;
}
