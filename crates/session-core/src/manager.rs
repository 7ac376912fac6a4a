//! Session lifecycle manager
//!
//! [`SessionManager`] owns at most one peer connection, the local camera
//! handle and an optional remote render surface.
//!
//! ```text
//!            connect            negotiated
//!   Idle ─────────────► Connecting ─────────► Connected
//!    ▲  ◄───────────────────┘  failure /           │
//!    │                         disconnect          │
//!    └─────────────────────────────────────────────┘
//!                       disconnect
//!
//!   any state ──dispose──► Disposed (terminal)
//! ```
//!
//! All transitions happen under one lock that is never held across an
//! `.await`. Negotiation runs on a spawned task; it only applies its result
//! if it is still the current attempt when it finishes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::camera::{CameraHandle, CaptureDevice};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::events::{EventPublisher, SessionEvent};
use crate::recovery::with_timeout;
use crate::transport::{MediaSession, TransportError};
use crate::types::{MediaHandle, PeerId, RemoteSurface, SessionState};

/// Owns the lifecycle of one peer connection at a time
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use vidlink_session_core::simulated::{SimulatedCamera, SimulatedMediaSession};
/// use vidlink_session_core::{SessionConfig, SessionManager, SessionState};
///
/// # tokio_test::block_on(async {
/// let manager = SessionManager::new(
///     SessionConfig::new(),
///     Arc::new(SimulatedMediaSession::new()),
///     Arc::new(SimulatedCamera::new()),
/// )
/// .unwrap();
///
/// manager.connect("12345").unwrap().await.unwrap();
/// assert_eq!(manager.state(), SessionState::Connected);
///
/// manager.disconnect().await.unwrap();
/// manager.dispose().await;
/// assert_eq!(manager.state(), SessionState::Disposed);
/// # })
/// ```
pub struct SessionManager {
    shared: Arc<Shared>,
}

struct Shared {
    config: SessionConfig,
    transport: Arc<dyn MediaSession>,
    capture: Arc<dyn CaptureDevice>,
    camera: CameraHandle,
    inner: Mutex<Inner>,
    events: EventPublisher,
}

struct Inner {
    state: SessionState,
    peer_id: Option<PeerId>,
    remote_surface: Option<RemoteSurface>,
    attempt: Option<Attempt>,
    active: Option<MediaHandle>,
    /// One token per detached session, cancelled once its resources are closed
    draining: Vec<CancellationToken>,
    next_attempt_id: u64,
}

/// Bookkeeping for the connect attempt in flight
#[derive(Clone)]
struct Attempt {
    id: u64,
    cancel: CancellationToken,
    /// Cancelled by the attempt task when it has released everything it held
    finished: CancellationToken,
}

/// Resources detached from the session that still need releasing
struct Teardown {
    attempt: Option<Attempt>,
    active: Option<MediaHandle>,
    done: CancellationToken,
}

impl SessionManager {
    /// Validate `config` and acquire the camera
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn MediaSession>,
        capture: Arc<dyn CaptureDevice>,
    ) -> SessionResult<Self> {
        config.validate()?;

        let camera = capture.acquire(config.source_kind, config.preview_resolution)?;
        info!(
            camera = %camera.device(),
            source_kind = %config.source_kind,
            direction = %config.direction,
            preview = %config.preview_resolution,
            "Session manager created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                transport,
                capture,
                camera,
                inner: Mutex::new(Inner {
                    state: SessionState::Idle,
                    peer_id: None,
                    remote_surface: None,
                    attempt: None,
                    active: None,
                    draining: Vec::new(),
                    next_attempt_id: 0,
                }),
                events: EventPublisher::new(),
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// Peer targeted while connecting or connected
    pub fn peer_id(&self) -> Option<PeerId> {
        self.shared.inner.lock().peer_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Receive every state transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Capture resource for the local preview
    ///
    /// The returned copy is read-only; it turns invalid on disposal.
    pub fn camera_handle(&self) -> SessionResult<CameraHandle> {
        let inner = self.shared.inner.lock();
        if inner.state == SessionState::Disposed {
            return Err(SessionError::invalid_state("camera_handle", inner.state));
        }
        Ok(self.shared.camera.clone())
    }

    /// Register the target for incoming video
    ///
    /// Allowed once, before connecting, and only when the configuration
    /// receives media and asked for a remote view.
    pub fn set_remote_surface(&self, surface: RemoteSurface) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != SessionState::Idle {
            return Err(SessionError::invalid_state("set_remote_surface", inner.state));
        }

        let config = &self.shared.config;
        if !config.direction.can_receive() {
            return Err(SessionError::invalid_config(
                "remote_surface",
                format!("direction {} does not receive media", config.direction),
            ));
        }
        if !config.remote_view {
            return Err(SessionError::invalid_config(
                "remote_surface",
                "remote view is not enabled in the session configuration",
            ));
        }
        if let Some(existing) = &inner.remote_surface {
            return Err(SessionError::invalid_config(
                "remote_surface",
                format!("already registered: {}", existing),
            ));
        }

        info!(surface = %surface, "Remote surface registered");
        inner.remote_surface = Some(surface);
        Ok(())
    }

    /// Start connecting to the peer named by `peer_id`
    ///
    /// State and peer id problems are reported immediately. Negotiation runs
    /// on a spawned task; the returned [`PendingConnection`] resolves when it
    /// finishes. Without a tokio runtime on the calling thread the call is
    /// rejected with `InvalidState`.
    pub fn connect(&self, peer_id: &str) -> SessionResult<PendingConnection> {
        let (attempt, peer, draining, runtime) = {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Idle {
                warn!(state = %inner.state, "Connect rejected, session not idle");
                return Err(SessionError::invalid_state("connect", inner.state));
            }

            let peer = PeerId::parse(peer_id).map_err(|e| {
                warn!(input = peer_id, "Connect rejected, malformed peer id");
                e
            })?;

            let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                warn!("Connect rejected, no tokio runtime on this thread");
                SessionError::invalid_state("connect", inner.state)
            })?;

            // Teardowns still closing handles must finish before the next open
            inner.draining.retain(|done| !done.is_cancelled());
            let draining = inner.draining.clone();

            inner.next_attempt_id += 1;
            let attempt = Attempt {
                id: inner.next_attempt_id,
                cancel: CancellationToken::new(),
                finished: CancellationToken::new(),
            };

            inner.state = SessionState::Connecting;
            inner.peer_id = Some(peer);
            inner.attempt = Some(attempt.clone());
            self.shared.events.state_changed(
                SessionState::Idle,
                SessionState::Connecting,
                Some(peer),
                None,
            );
            (attempt, peer, draining, runtime)
        };

        info!(%peer, attempt = attempt.id, "Connecting to remote peer");

        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            let _finished = attempt.finished.clone().drop_guard();
            let result = shared
                .run_attempt(attempt.id, peer, attempt.cancel, draining)
                .await;
            // The caller may have dropped the pending connection
            let _ = tx.send(result);
        });

        Ok(PendingConnection { peer, rx })
    }

    /// Connect and wait for the outcome
    pub async fn connect_and_wait(&self, peer_id: &str) -> SessionResult<()> {
        self.connect(peer_id)?.await
    }

    /// Tear down the current session and return to `Idle`
    ///
    /// A pending negotiation is cancelled and its partial resources are
    /// released before this returns. Calling it while `Idle` does nothing.
    pub async fn disconnect(&self) -> SessionResult<()> {
        let teardown = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                SessionState::Disposed => {
                    return Err(SessionError::invalid_state("disconnect", inner.state));
                }
                SessionState::Idle => {
                    debug!("Disconnect while idle, nothing to do");
                    return Ok(());
                }
                SessionState::Connecting | SessionState::Connected => {
                    self.shared.detach(&mut inner, "disconnect requested")
                }
            }
        };

        self.shared.release(teardown).await;
        info!("Disconnected");
        Ok(())
    }

    /// Release everything and enter the terminal `Disposed` state
    ///
    /// Tears down any session first and waits for earlier disconnects to
    /// finish closing, then releases the camera. Repeated calls do nothing.
    pub async fn dispose(&self) {
        let (teardown, draining) = {
            let mut inner = self.shared.inner.lock();
            if inner.state == SessionState::Disposed {
                debug!("Session manager already disposed");
                return;
            }

            let teardown = inner
                .state
                .has_session()
                .then(|| self.shared.detach(&mut inner, "disposing"));
            inner.state = SessionState::Disposed;
            inner.remote_surface = None;
            (teardown, std::mem::take(&mut inner.draining))
        };

        if let Some(teardown) = teardown {
            self.shared.release(teardown).await;
        }
        for done in draining {
            if !done.is_cancelled() {
                debug!("Waiting for an earlier disconnect to finish closing");
                done.cancelled().await;
            }
        }
        self.shared.release_camera();
        self.shared
            .events
            .state_changed(SessionState::Idle, SessionState::Disposed, None, None);
        info!("Session manager disposed");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let inner = self.shared.inner.lock();
        if inner.state != SessionState::Disposed {
            warn!(state = %inner.state, "Session manager dropped without dispose");
            if let Some(attempt) = &inner.attempt {
                attempt.cancel.cancel();
            }
        }
    }
}

impl Shared {
    /// Move out of `Connecting`/`Connected` under the lock
    fn detach(&self, inner: &mut Inner, reason: &str) -> Teardown {
        let previous = inner.state;
        let teardown = Teardown {
            attempt: inner.attempt.take(),
            active: inner.active.take(),
            done: CancellationToken::new(),
        };
        inner.draining.push(teardown.done.clone());

        if let Some(attempt) = &teardown.attempt {
            attempt.cancel.cancel();
        }

        inner.state = SessionState::Idle;
        let peer = inner.peer_id.take();
        self.events.state_changed(
            previous,
            SessionState::Idle,
            peer,
            Some(reason.to_string()),
        );
        teardown
    }

    /// Wait for a cancelled attempt to clean up and close the active handle
    async fn release(&self, teardown: Teardown) {
        let Teardown {
            attempt,
            active,
            done,
        } = teardown;
        let _done = done.drop_guard();

        if let Some(attempt) = attempt {
            attempt.finished.cancelled().await;
            debug!(attempt = attempt.id, "Cancelled attempt finished cleanup");
        }
        if let Some(handle) = active {
            self.close_handle(handle).await;
        }
    }

    fn release_camera(&self) {
        if let Err(e) = self.capture.release(&self.camera) {
            error!(camera = %self.camera.device(), error = %e, "Failed to release camera during dispose");
        }
        self.camera.invalidate();
    }

    async fn close_handle(&self, handle: MediaHandle) {
        if let Err(e) = self.transport.close(handle).await {
            warn!(%handle, error = %e, "Failed to close media session");
        }
    }

    fn is_current(&self, inner: &Inner, attempt_id: u64) -> bool {
        inner.attempt.as_ref().map(|a| a.id) == Some(attempt_id)
    }

    async fn run_attempt(
        &self,
        attempt_id: u64,
        peer: PeerId,
        cancel: CancellationToken,
        draining: Vec<CancellationToken>,
    ) -> SessionResult<()> {
        let cancelled = || SessionError::Cancelled { peer_id: peer.value() };

        if !draining.is_empty() {
            debug!(%peer, pending = draining.len(), "Waiting for previous session teardown");
        }
        for done in &draining {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = done.cancelled() => {}
            }
        }

        let handle = match self
            .transport
            .open(self.config.source_kind, self.config.direction)
            .await
        {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail_attempt(attempt_id, peer, &cancel, &e)),
        };
        debug!(%handle, %peer, "Media session opened");

        if cancel.is_cancelled() {
            self.close_handle(handle).await;
            return Err(cancelled());
        }

        let negotiated = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = with_timeout(
                "negotiate",
                self.config.negotiation_timeout(),
                self.transport.negotiate(handle, peer),
            ) => Some(result),
        };

        match negotiated {
            None => {
                info!(%peer, "Negotiation cancelled");
                self.close_handle(handle).await;
                return Err(cancelled());
            }
            Some(Err(e)) => {
                self.close_handle(handle).await;
                return Err(self.fail_attempt(attempt_id, peer, &cancel, &e));
            }
            Some(Ok(())) => {}
        }

        let surface = {
            let inner = self.inner.lock();
            inner
                .remote_surface
                .clone()
                .filter(|_| self.config.direction.can_receive())
        };

        if let Some(surface) = &surface {
            if let Err(e) = self.transport.bind_remote_render(handle, surface).await {
                self.close_handle(handle).await;
                return Err(self.fail_attempt(attempt_id, peer, &cancel, &e));
            }
            debug!(%handle, surface = %surface, "Remote render bound");
        }

        let committed = {
            let mut inner = self.inner.lock();
            if self.is_current(&inner, attempt_id) && !cancel.is_cancelled() {
                inner.attempt = None;
                inner.active = Some(handle);
                inner.state = SessionState::Connected;
                if let Some(surface) = surface {
                    self.events.publish(SessionEvent::RemoteRenderBound { handle, surface });
                }
                self.events.state_changed(
                    SessionState::Connecting,
                    SessionState::Connected,
                    Some(peer),
                    None,
                );
                true
            } else {
                false
            }
        };

        if !committed {
            info!(%peer, "Negotiation finished after cancellation, discarding");
            self.close_handle(handle).await;
            return Err(cancelled());
        }

        info!(%peer, %handle, "Connected to remote peer");
        Ok(())
    }

    /// Return to `Idle` after a transport failure, if still the current attempt
    fn fail_attempt(
        &self,
        attempt_id: u64,
        peer: PeerId,
        cancel: &CancellationToken,
        source: &TransportError,
    ) -> SessionError {
        if cancel.is_cancelled() {
            return SessionError::Cancelled { peer_id: peer.value() };
        }

        let error = SessionError::connection_failed(peer.value(), source);
        let mut inner = self.inner.lock();
        if self.is_current(&inner, attempt_id) {
            inner.attempt = None;
            inner.state = SessionState::Idle;
            inner.peer_id = None;
            self.events.state_changed(
                SessionState::Connecting,
                SessionState::Idle,
                Some(peer),
                Some(error.to_string()),
            );
        }
        error!(%peer, error = %source, "Failed to connect to remote peer");
        error
    }
}

/// Completion of a [`SessionManager::connect`] call
///
/// Resolves to `Ok(())` once connected, `ConnectionFailed` on transport
/// failure, or `Cancelled` if the session was torn down first. Dropping it
/// does not cancel the attempt.
#[must_use = "the connection outcome is only reported through this future"]
#[derive(Debug)]
pub struct PendingConnection {
    peer: PeerId,
    rx: oneshot::Receiver<SessionResult<()>>,
}

impl PendingConnection {
    pub fn peer_id(&self) -> PeerId {
        self.peer
    }
}

impl Future for PendingConnection {
    type Output = SessionResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let peer = self.peer;
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(SessionError::ConnectionFailed {
                    peer_id: peer.value(),
                    reason: "connection task ended unexpectedly".to_string(),
                })
            })
        })
    }
}
