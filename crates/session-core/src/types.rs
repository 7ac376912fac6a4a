//! Core types for the session lifecycle
//!
//! Identifiers, lifecycle states and the media parameters fixed at
//! configuration time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Lifecycle state of a [`SessionManager`](crate::SessionManager)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No peer connection; ready to connect
    Idle,
    /// Negotiation with a peer is in flight
    Connecting,
    /// Media session established with a peer
    Connected,
    /// Resources released; terminal
    Disposed,
}

impl SessionState {
    /// Whether a peer connection is in progress or established
    pub fn has_session(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Connected)
    }

    /// Whether the state is terminal
    pub fn is_terminal(&self) -> bool {
        *self == SessionState::Disposed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}

/// Origin of the locally captured video fed into the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaSourceKind {
    /// Raw media packets pushed by the application
    MediaPacket,
    /// Hardware camera feed
    Camera,
}

impl fmt::Display for MediaSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSourceKind::MediaPacket => f.write_str("media-packet"),
            MediaSourceKind::Camera => f.write_str("camera"),
        }
    }
}

impl FromStr for MediaSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "media-packet" | "mediapacket" | "packet" => Ok(MediaSourceKind::MediaPacket),
            "camera" => Ok(MediaSourceKind::Camera),
            other => Err(format!("unknown media source kind: {}", other)),
        }
    }
}

/// Permitted media flow for the session's transceivers
///
/// Mirrors the SDP direction attributes (RFC 4566).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransceiverDirection {
    /// Send only
    SendOnly,
    /// Receive only
    RecvOnly,
    /// Send and receive
    SendRecv,
    /// No media flow
    Inactive,
}

impl TransceiverDirection {
    /// Whether incoming media can be received
    pub fn can_receive(&self) -> bool {
        matches!(self, TransceiverDirection::RecvOnly | TransceiverDirection::SendRecv)
    }

    /// Whether local media is sent
    pub fn can_send(&self) -> bool {
        matches!(self, TransceiverDirection::SendOnly | TransceiverDirection::SendRecv)
    }
}

impl fmt::Display for TransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransceiverDirection::SendOnly => "sendonly",
            TransceiverDirection::RecvOnly => "recvonly",
            TransceiverDirection::SendRecv => "sendrecv",
            TransceiverDirection::Inactive => "inactive",
        };
        f.write_str(name)
    }
}

impl FromStr for TransceiverDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "send-only" | "sendonly" => Ok(TransceiverDirection::SendOnly),
            "recv-only" | "recvonly" => Ok(TransceiverDirection::RecvOnly),
            "send-recv" | "sendrecv" => Ok(TransceiverDirection::SendRecv),
            "inactive" => Ok(TransceiverDirection::Inactive),
            other => Err(format!("unknown transceiver direction: {}", other)),
        }
    }
}

/// Video resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// VGA, the preview size on common device profiles
    pub const fn vga() -> Self {
        Self::new(640, 480)
    }

    /// QVGA, the preview size on mobile device profiles
    pub const fn qvga() -> Self {
        Self::new(320, 240)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Identifier of a remote peer on the signaling server
///
/// Peers are numbered with signed 32-bit integers. Surrounding whitespace
/// is ignored; anything else that does not parse is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(i32);

impl PeerId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Validate user-entered text as a peer id
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidPeerId {
                input: input.to_string(),
                reason: "peer id is empty".to_string(),
            });
        }

        trimmed
            .parse::<i32>()
            .map(PeerId)
            .map_err(|e| SessionError::InvalidPeerId {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl FromStr for PeerId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeerId::parse(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-side handle for one opened media session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaHandle(Uuid);

impl MediaHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media-{}", self.0)
    }
}

/// Externally supplied target for rendering incoming video
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteSurface {
    id: Uuid,
    /// Label used in logs, e.g. the window title
    pub label: String,
    pub resolution: Resolution,
}

impl RemoteSurface {
    pub fn new(label: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            resolution,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for RemoteSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.resolution)
    }
}
