//! Session events and UI affordances
//!
//! The manager publishes every state transition on a broadcast channel.
//! A presentation layer subscribes and derives which controls to enable
//! from [`ControlAffordances::for_state`] instead of toggling buttons inline.
//!
//! ```rust
//! use vidlink_session_core::events::ControlAffordances;
//! use vidlink_session_core::types::SessionState;
//!
//! let idle = ControlAffordances::for_state(SessionState::Idle);
//! assert!(idle.connect_enabled);
//! assert!(!idle.reset_enabled);
//!
//! let busy = ControlAffordances::for_state(SessionState::Connecting);
//! assert!(!busy.connect_enabled);
//! assert!(busy.reset_enabled);
//! ```

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

use crate::types::{MediaHandle, PeerId, RemoteSurface, SessionState};

/// Capacity of the event channel; slow subscribers see `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A single lifecycle transition
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub previous: SessionState,
    pub current: SessionState,
    /// Peer targeted by the session the transition belongs to
    pub peer_id: Option<PeerId>,
    /// Why the transition happened, e.g. a failure message
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Notifications published by the session manager
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Lifecycle state changed
    StateChanged(StateChange),
    /// Incoming video is routed to the registered surface
    RemoteRenderBound {
        handle: MediaHandle,
        surface: RemoteSurface,
    },
}

impl SessionEvent {
    /// The state change carried by this event, if any
    pub fn state_change(&self) -> Option<&StateChange> {
        match self {
            SessionEvent::StateChanged(change) => Some(change),
            _ => None,
        }
    }
}

/// Which controls a UI should enable for a given session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAffordances {
    pub peer_input_enabled: bool,
    pub connect_enabled: bool,
    pub reset_enabled: bool,
}

impl ControlAffordances {
    pub fn for_state(state: SessionState) -> Self {
        match state {
            SessionState::Idle => Self {
                peer_input_enabled: true,
                connect_enabled: true,
                reset_enabled: false,
            },
            SessionState::Connecting | SessionState::Connected => Self {
                peer_input_enabled: false,
                connect_enabled: false,
                reset_enabled: true,
            },
            SessionState::Disposed => Self {
                peer_input_enabled: false,
                connect_enabled: false,
                reset_enabled: false,
            },
        }
    }
}

/// Broadcast fan-out for session events
#[derive(Debug)]
pub(crate) struct EventPublisher {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventPublisher {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn state_changed(
        &self,
        previous: SessionState,
        current: SessionState,
        peer_id: Option<PeerId>,
        reason: Option<String>,
    ) {
        self.publish(SessionEvent::StateChanged(StateChange {
            previous,
            current,
            peer_id,
            reason,
            timestamp: Utc::now(),
        }));
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // No subscribers is not an error
        if self.tx.send(event).is_err() {
            trace!("Session event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposed_disables_everything() {
        let affordances = ControlAffordances::for_state(SessionState::Disposed);
        assert!(!affordances.peer_input_enabled);
        assert!(!affordances.connect_enabled);
        assert!(!affordances.reset_enabled);
    }

    #[test]
    fn test_connected_only_allows_reset() {
        let affordances = ControlAffordances::for_state(SessionState::Connected);
        assert_eq!(
            affordances,
            ControlAffordances {
                peer_input_enabled: false,
                connect_enabled: false,
                reset_enabled: true,
            }
        );
    }

    #[tokio::test]
    async fn test_publisher_delivers_state_changes() {
        let publisher = EventPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.state_changed(
            SessionState::Idle,
            SessionState::Connecting,
            Some(PeerId::new(7)),
            None,
        );

        let event = rx.recv().await.unwrap();
        let change = event.state_change().expect("state change");
        assert_eq!(change.previous, SessionState::Idle);
        assert_eq!(change.current, SessionState::Connecting);
        assert_eq!(change.peer_id, Some(PeerId::new(7)));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = EventPublisher::new();
        publisher.state_changed(SessionState::Idle, SessionState::Disposed, None, None);
    }
}
