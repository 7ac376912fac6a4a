//! Local capture device abstraction
//!
//! The manager acquires one [`CameraHandle`] when it is built and releases it
//! on disposal. Callers only ever see read-only copies: they can attach a
//! preview to it but cannot release it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::types::{MediaSourceKind, Resolution};

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture device errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// No capture device available
    #[error("Capture device not found: {device}")]
    DeviceNotFound { device: String },

    /// Device cannot deliver the requested preview resolution
    #[error("Resolution {resolution} not supported by {device}")]
    ResolutionNotSupported { resolution: Resolution, device: String },

    /// Device is held by someone else
    #[error("Capture device is already in use: {device}")]
    DeviceInUse { device: String },

    /// Platform-specific failure
    #[error("Platform capture error: {message}")]
    Platform { message: String },
}

/// Read-only view of the manager's capture resource
///
/// Clones share validity: once the manager is disposed, every copy reports
/// `is_valid() == false`.
#[derive(Clone)]
pub struct CameraHandle {
    id: Uuid,
    device: String,
    source_kind: MediaSourceKind,
    resolution: Resolution,
    valid: Arc<AtomicBool>,
}

impl CameraHandle {
    /// Create a handle for a freshly acquired device
    pub fn new(device: impl Into<String>, source_kind: MediaSourceKind, resolution: Resolution) -> Self {
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            source_kind,
            resolution,
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn source_kind(&self) -> MediaSourceKind {
        self.source_kind
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Whether the underlying capture resource is still held by the manager
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

impl fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraHandle")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("source_kind", &self.source_kind)
            .field("resolution", &self.resolution)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl PartialEq for CameraHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CameraHandle {}

/// Platform camera / media-packet source
pub trait CaptureDevice: Send + Sync + fmt::Debug {
    /// Acquire the capture resource for the given source and preview size
    fn acquire(&self, source_kind: MediaSourceKind, resolution: Resolution) -> CaptureResult<CameraHandle>;

    /// Release a handle previously returned by `acquire`
    fn release(&self, handle: &CameraHandle) -> CaptureResult<()>;
}
