//! In-process transport and camera
//!
//! Stand-ins for the native media stack: negotiation is a timer, peers are
//! reachable when listed, and every call is recorded so callers can inspect
//! what the manager did. Used by the console driver and by tests.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::camera::{CameraHandle, CaptureDevice, CaptureError, CaptureResult};
use crate::transport::{MediaSession, TransportError, TransportResult};
use crate::types::{MediaHandle, MediaSourceKind, PeerId, RemoteSurface, Resolution, TransceiverDirection};

/// A call received by [`SimulatedMediaSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    Open {
        source_kind: MediaSourceKind,
        direction: TransceiverDirection,
    },
    Negotiate {
        handle: MediaHandle,
        peer: PeerId,
    },
    BindRemoteRender {
        handle: MediaHandle,
        surface: String,
    },
    Close {
        handle: MediaHandle,
    },
}

#[derive(Debug, Default)]
struct TransportState {
    open_handles: HashSet<MediaHandle>,
    ops: Vec<TransportOp>,
}

/// Timer-driven [`MediaSession`]
#[derive(Debug)]
pub struct SimulatedMediaSession {
    latency: Duration,
    reachable: HashSet<PeerId>,
    fail_bind: bool,
    state: Mutex<TransportState>,
}

impl SimulatedMediaSession {
    /// Every peer is reachable and negotiation completes immediately
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            reachable: HashSet::new(),
            fail_bind: false,
            state: Mutex::new(TransportState::default()),
        }
    }

    /// Time each negotiation takes
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Restrict reachable peers; an empty list means every peer answers
    pub fn with_reachable_peers(mut self, peers: impl IntoIterator<Item = PeerId>) -> Self {
        self.reachable = peers.into_iter().collect();
        self
    }

    /// Make `bind_remote_render` fail
    pub fn with_bind_failure(mut self) -> Self {
        self.fail_bind = true;
        self
    }

    /// Number of handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles.len()
    }

    /// Every call received so far, in order
    pub fn operations(&self) -> Vec<TransportOp> {
        self.state.lock().ops.clone()
    }

    fn record(&self, op: TransportOp) {
        self.state.lock().ops.push(op);
    }

    fn ensure_open(&self, handle: MediaHandle) -> TransportResult<()> {
        if self.state.lock().open_handles.contains(&handle) {
            Ok(())
        } else {
            Err(TransportError::UnknownHandle { handle })
        }
    }
}

#[async_trait]
impl MediaSession for SimulatedMediaSession {
    async fn open(
        &self,
        source_kind: MediaSourceKind,
        direction: TransceiverDirection,
    ) -> TransportResult<MediaHandle> {
        let handle = MediaHandle::new();
        {
            let mut state = self.state.lock();
            state.ops.push(TransportOp::Open { source_kind, direction });
            state.open_handles.insert(handle);
        }
        debug!(%handle, %source_kind, %direction, "Simulated media session opened");
        Ok(handle)
    }

    async fn negotiate(&self, handle: MediaHandle, peer: PeerId) -> TransportResult<()> {
        self.record(TransportOp::Negotiate { handle, peer });
        self.ensure_open(handle)?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if !self.reachable.is_empty() && !self.reachable.contains(&peer) {
            return Err(TransportError::PeerUnreachable { peer_id: peer });
        }

        info!(%handle, %peer, "Simulated negotiation complete");
        Ok(())
    }

    async fn bind_remote_render(
        &self,
        handle: MediaHandle,
        surface: &RemoteSurface,
    ) -> TransportResult<()> {
        self.record(TransportOp::BindRemoteRender {
            handle,
            surface: surface.label.clone(),
        });
        self.ensure_open(handle)?;

        if self.fail_bind {
            return Err(TransportError::RenderBindFailed {
                reason: format!("surface {} rejected", surface),
            });
        }
        Ok(())
    }

    async fn close(&self, handle: MediaHandle) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.ops.push(TransportOp::Close { handle });
        if state.open_handles.remove(&handle) {
            debug!(%handle, "Simulated media session closed");
            Ok(())
        } else {
            Err(TransportError::UnknownHandle { handle })
        }
    }
}

#[derive(Debug, Default)]
struct CameraState {
    held: Option<CameraHandle>,
    releases: usize,
}

/// Capture device that always has one camera
#[derive(Debug)]
pub struct SimulatedCamera {
    device: String,
    max_resolution: Resolution,
    fail_release: bool,
    state: Mutex<CameraState>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            device: "simulated-camera0".to_string(),
            max_resolution: Resolution::new(1920, 1080),
            fail_release: false,
            state: Mutex::new(CameraState::default()),
        }
    }

    /// Largest preview the device accepts
    pub fn with_max_resolution(mut self, resolution: Resolution) -> Self {
        self.max_resolution = resolution;
        self
    }

    /// Make `release` fail
    pub fn with_release_failure(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Whether a handle is currently acquired
    pub fn is_held(&self) -> bool {
        self.state.lock().held.is_some()
    }

    /// Number of release calls received
    pub fn release_count(&self) -> usize {
        self.state.lock().releases
    }
}

impl CaptureDevice for SimulatedCamera {
    fn acquire(&self, source_kind: MediaSourceKind, resolution: Resolution) -> CaptureResult<CameraHandle> {
        if resolution.width > self.max_resolution.width || resolution.height > self.max_resolution.height {
            return Err(CaptureError::ResolutionNotSupported {
                resolution,
                device: self.device.clone(),
            });
        }

        let mut state = self.state.lock();
        if state.held.is_some() {
            return Err(CaptureError::DeviceInUse {
                device: self.device.clone(),
            });
        }

        let handle = CameraHandle::new(self.device.clone(), source_kind, resolution);
        state.held = Some(handle.clone());
        Ok(handle)
    }

    fn release(&self, handle: &CameraHandle) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.releases += 1;

        if self.fail_release {
            return Err(CaptureError::Platform {
                message: "camera driver refused to release".to_string(),
            });
        }

        match &state.held {
            Some(held) if held == handle => {
                state.held = None;
                Ok(())
            }
            _ => Err(CaptureError::DeviceNotFound {
                device: handle.device().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_close_track_handles() {
        let transport = SimulatedMediaSession::new();
        let handle = transport
            .open(MediaSourceKind::MediaPacket, TransceiverDirection::SendRecv)
            .await
            .unwrap();
        assert_eq!(transport.open_handles(), 1);

        transport.close(handle).await.unwrap();
        assert_eq!(transport.open_handles(), 0);
        assert!(matches!(
            transport.close(handle).await,
            Err(TransportError::UnknownHandle { .. })
        ));
    }

    #[tokio::test]
    async fn test_unlisted_peer_is_unreachable() {
        let transport = SimulatedMediaSession::new().with_reachable_peers([PeerId::new(1)]);
        let handle = transport
            .open(MediaSourceKind::Camera, TransceiverDirection::SendOnly)
            .await
            .unwrap();

        assert!(transport.negotiate(handle, PeerId::new(1)).await.is_ok());
        assert_eq!(
            transport.negotiate(handle, PeerId::new(2)).await,
            Err(TransportError::PeerUnreachable { peer_id: PeerId::new(2) })
        );
    }

    #[test]
    fn test_camera_is_exclusive() {
        let camera = SimulatedCamera::new();
        let handle = camera.acquire(MediaSourceKind::Camera, Resolution::vga()).unwrap();
        assert!(matches!(
            camera.acquire(MediaSourceKind::Camera, Resolution::vga()),
            Err(CaptureError::DeviceInUse { .. })
        ));

        camera.release(&handle).unwrap();
        assert!(!camera.is_held());
        assert_eq!(camera.release_count(), 1);
    }

    #[test]
    fn test_camera_rejects_oversized_preview() {
        let camera = SimulatedCamera::new().with_max_resolution(Resolution::qvga());
        assert!(matches!(
            camera.acquire(MediaSourceKind::Camera, Resolution::vga()),
            Err(CaptureError::ResolutionNotSupported { .. })
        ));
    }
}
