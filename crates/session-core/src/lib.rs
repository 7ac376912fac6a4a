//! # vidlink-session-core
//!
//! Lifecycle management for a single peer-to-peer video session.
//!
//! A [`SessionManager`] sits between a presentation layer (peer id entry,
//! Connect / Reset buttons, local preview) and a native WebRTC stack. It owns
//! exactly one peer connection at a time, the local camera handle and an
//! optional remote render surface, and it guarantees that everything is
//! released on disconnect or shutdown.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │   UI / console driver   │  connect(peer) · disconnect() · dispose()
//! └───────────┬─────────────┘
//!             │            ▲ SessionEvent (broadcast)
//! ┌───────────▼────────────┴┐
//! │     SessionManager      │  Idle → Connecting → Connected → … → Disposed
//! └─────┬─────────────┬─────┘
//!       │             │
//! ┌─────▼──────┐ ┌────▼──────────┐
//! │MediaSession│ │ CaptureDevice │
//! │ (transport)│ │   (camera)    │
//! └────────────┘ └───────────────┘
//! ```
//!
//! The transport and camera are traits; [`simulated`] provides in-process
//! implementations.

pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod recovery;
pub mod simulated;
pub mod transport;
pub mod types;

pub use camera::{CameraHandle, CaptureDevice, CaptureError};
pub use config::{AppConfig, ConfigError, DeviceProfile, ProfileParams, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use events::{ControlAffordances, SessionEvent, StateChange};
pub use manager::{PendingConnection, SessionManager};
pub use transport::{MediaSession, TransportError, TransportResult};
pub use types::{
    MediaHandle, MediaSourceKind, PeerId, RemoteSurface, Resolution, SessionState,
    TransceiverDirection,
};
