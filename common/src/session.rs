//! Session registry and lifecycle state machine.
//!
//! The transport collaborator owns connectivity (ICE, DTLS, SDP); this
//! module owns the bookkeeping around it. Each session is an entry in an
//! explicit registry keyed by session id, holding its own track
//! configuration and lifecycle state. Collaborator notifications arrive
//! as [`SessionEvent`] values and drive the state machine; there is no
//! global mutable state and no callback plumbing.
//!
//! One publisher feeds the bridge; up to a configured number of
//! subscribers consume from it.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::record::MediaKind;
use crate::track::TrackConfig;

/// Identifier for a registered session.
pub type SessionId = u64;

/// Lifecycle of one session against the transport collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, no offer seen yet
    Idle,

    /// Offer received, answer/gathering in progress
    Negotiating,

    /// Transport up, tracks may be open
    Connected,

    /// Teardown requested or all tracks lost
    Closing,

    /// Fully torn down; terminal
    Closed,
}

/// Notifications from the transport collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Remote offer arrived for this session
    OfferReceived,

    /// Local answer was produced and handed back
    AnswerSent,

    /// Transport reported the connection established
    TransportConnected,

    /// A track opened
    TrackOpened(MediaKind),

    /// A track closed normally
    TrackClosed(MediaKind),

    /// A track failed
    TrackError(MediaKind),

    /// Local teardown requested
    CloseRequested,

    /// Transport reported the connection gone
    TransportClosed,
}

/// Role a session plays against the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Feeds media into the bridge; at most one at a time
    Publisher,

    /// Consumes media from the bridge
    Subscriber,
}

/// Session management errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A publisher is already registered and not yet closed.
    #[error("a publisher session is already active")]
    PublisherBusy,

    /// All subscriber slots are taken.
    #[error("subscriber capacity ({0}) exhausted")]
    CapacityExhausted(usize),

    /// No session with the given id.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// The event is not legal in the session's current state.
    #[error("invalid transition from {state:?} on {event:?}")]
    InvalidTransition {
        /// State the session was in
        state: SessionState,
        /// Event that was rejected
        event: SessionEvent,
    },
}

/// One registered session: role, lifecycle state, and track bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    // ---
    /// Role of this session
    pub role: SessionRole,

    /// Current lifecycle state
    pub state: SessionState,

    /// Payload-type assignment for this session's tracks
    pub tracks: TrackConfig,

    video_open: bool,
    audio_open: bool,
}

impl SessionEntry {
    // ---
    fn new(role: SessionRole, tracks: TrackConfig) -> Self {
        // ---
        Self {
            role,
            state: SessionState::Idle,
            tracks,
            video_open: false,
            audio_open: false,
        }
    }

    /// Returns whether the given track is currently open.
    pub fn is_track_open(&self, kind: MediaKind) -> bool {
        // ---
        match kind {
            MediaKind::Video => self.video_open,
            MediaKind::Audio => self.audio_open,
        }
    }

    fn set_track_open(&mut self, kind: MediaKind, open: bool) {
        // ---
        match kind {
            MediaKind::Video => self.video_open = open,
            MediaKind::Audio => self.audio_open = open,
        }
    }

    /// Applies a collaborator event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the event is not legal in the
    /// current state. The entry is left unchanged in that case.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, SessionError> {
        // ---
        use SessionEvent::*;
        use SessionState::*;

        let next = match (self.state, event) {
            (Idle, OfferReceived) => Negotiating,
            (Negotiating, AnswerSent) => Negotiating,
            (Negotiating, TransportConnected) => Connected,

            (Connected, TrackOpened(kind)) => {
                self.set_track_open(kind, true);
                Connected
            }
            (Connected, TrackClosed(kind)) => {
                self.set_track_open(kind, false);
                Connected
            }
            (Connected, TrackError(kind)) => {
                self.set_track_open(kind, false);
                // A session with no surviving tracks starts teardown
                if !self.video_open && !self.audio_open {
                    Closing
                } else {
                    Connected
                }
            }

            (Idle | Negotiating | Connected, CloseRequested) => Closing,
            (Negotiating | Connected | Closing, TransportClosed) => Closed,

            (state, event) => {
                return Err(SessionError::InvalidTransition { state, event });
            }
        };

        if next != self.state {
            debug!("session transition {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        Ok(next)
    }
}

/// Registry of active sessions.
///
/// Replaces an ambient pool of client slots with an owned map: every
/// session is addressed by id, and each entry owns its state and track
/// configuration exclusively.
#[derive(Debug)]
pub struct SessionRegistry {
    // ---
    sessions: HashMap<SessionId, SessionEntry>,
    publisher: Option<SessionId>,
    max_subscribers: usize,
    next_id: SessionId,
}

impl SessionRegistry {
    // ---
    /// Creates a registry admitting at most `max_subscribers` subscriber
    /// sessions alongside the single publisher slot.
    pub fn new(max_subscribers: usize) -> Self {
        // ---
        Self {
            sessions: HashMap::new(),
            publisher: None,
            max_subscribers,
            next_id: 1,
        }
    }

    /// Registers a new session in `Idle` state.
    ///
    /// # Errors
    ///
    /// Returns `PublisherBusy` if a publisher is already registered, or
    /// `CapacityExhausted` when all subscriber slots are in use.
    pub fn open(
        &mut self,
        role: SessionRole,
        tracks: TrackConfig,
    ) -> Result<SessionId, SessionError> {
        // ---
        match role {
            SessionRole::Publisher => {
                if self.publisher.is_some() {
                    return Err(SessionError::PublisherBusy);
                }
            }
            SessionRole::Subscriber => {
                let subscribers = self
                    .sessions
                    .values()
                    .filter(|e| e.role == SessionRole::Subscriber)
                    .count();
                if subscribers >= self.max_subscribers {
                    return Err(SessionError::CapacityExhausted(self.max_subscribers));
                }
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(id, SessionEntry::new(role, tracks));
        if role == SessionRole::Publisher {
            self.publisher = Some(id);
        }

        debug!("session {} opened as {:?}", id, role);
        Ok(id)
    }

    /// Applies a collaborator event to a session.
    pub fn apply(
        &mut self,
        id: SessionId,
        event: SessionEvent,
    ) -> Result<SessionState, SessionError> {
        // ---
        let entry = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        entry.apply(event)
    }

    /// Removes a session, freeing its slot.
    pub fn remove(&mut self, id: SessionId) -> Option<SessionEntry> {
        // ---
        if self.publisher == Some(id) {
            self.publisher = None;
        }
        self.sessions.remove(&id)
    }

    /// Returns the session entry, if registered.
    pub fn get(&self, id: SessionId) -> Option<&SessionEntry> {
        // ---
        self.sessions.get(&id)
    }

    /// Returns the active publisher session, if any.
    pub fn publisher(&self) -> Option<(SessionId, &SessionEntry)> {
        // ---
        let id = self.publisher?;
        self.sessions.get(&id).map(|e| (id, e))
    }

    /// Iterates over connected subscriber sessions.
    pub fn connected_subscribers(&self) -> impl Iterator<Item = (SessionId, &SessionEntry)> {
        // ---
        self.sessions.iter().filter_map(|(&id, e)| {
            (e.role == SessionRole::Subscriber && e.state == SessionState::Connected)
                .then_some((id, e))
        })
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        // ---
        self.sessions.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        // ---
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn connect(registry: &mut SessionRegistry, id: SessionId) {
        // ---
        registry.apply(id, SessionEvent::OfferReceived).unwrap();
        registry.apply(id, SessionEvent::AnswerSent).unwrap();
        registry.apply(id, SessionEvent::TransportConnected).unwrap();
    }

    #[test]
    fn test_session_lifecycle() {
        // ---
        let mut registry = SessionRegistry::new(4);
        let id = registry
            .open(SessionRole::Subscriber, TrackConfig::default())
            .expect("open failed");

        connect(&mut registry, id);
        assert_eq!(registry.get(id).unwrap().state, SessionState::Connected);

        registry
            .apply(id, SessionEvent::TrackOpened(MediaKind::Video))
            .unwrap();
        assert!(registry.get(id).unwrap().is_track_open(MediaKind::Video));

        registry.apply(id, SessionEvent::CloseRequested).unwrap();
        let state = registry.apply(id, SessionEvent::TransportClosed).unwrap();
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_single_publisher_slot() {
        // ---
        let mut registry = SessionRegistry::new(4);
        let first = registry
            .open(SessionRole::Publisher, TrackConfig::default())
            .expect("first publisher");

        assert_eq!(
            registry.open(SessionRole::Publisher, TrackConfig::default()),
            Err(SessionError::PublisherBusy)
        );

        // Removing the publisher frees the slot
        registry.remove(first);
        assert!(registry
            .open(SessionRole::Publisher, TrackConfig::default())
            .is_ok());
    }

    #[test]
    fn test_subscriber_capacity() {
        // ---
        let mut registry = SessionRegistry::new(2);
        registry
            .open(SessionRole::Subscriber, TrackConfig::default())
            .unwrap();
        registry
            .open(SessionRole::Subscriber, TrackConfig::default())
            .unwrap();

        assert_eq!(
            registry.open(SessionRole::Subscriber, TrackConfig::default()),
            Err(SessionError::CapacityExhausted(2))
        );
    }

    #[test]
    fn test_invalid_transition_rejected() {
        // ---
        let mut registry = SessionRegistry::new(1);
        let id = registry
            .open(SessionRole::Subscriber, TrackConfig::default())
            .unwrap();

        // AnswerSent before any offer is illegal
        let err = registry.apply(id, SessionEvent::AnswerSent).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                state: SessionState::Idle,
                event: SessionEvent::AnswerSent,
            }
        );

        // State unchanged after the rejection
        assert_eq!(registry.get(id).unwrap().state, SessionState::Idle);
    }

    #[test]
    fn test_track_error_drains_session() {
        // ---
        let mut registry = SessionRegistry::new(1);
        let id = registry
            .open(SessionRole::Subscriber, TrackConfig::default())
            .unwrap();
        connect(&mut registry, id);

        registry
            .apply(id, SessionEvent::TrackOpened(MediaKind::Video))
            .unwrap();
        registry
            .apply(id, SessionEvent::TrackOpened(MediaKind::Audio))
            .unwrap();

        let state = registry
            .apply(id, SessionEvent::TrackError(MediaKind::Video))
            .unwrap();
        assert_eq!(state, SessionState::Connected);

        // Losing the last track starts teardown
        let state = registry
            .apply(id, SessionEvent::TrackError(MediaKind::Audio))
            .unwrap();
        assert_eq!(state, SessionState::Closing);
    }

    #[test]
    fn test_unknown_session() {
        // ---
        let mut registry = SessionRegistry::new(1);
        assert_eq!(
            registry.apply(42, SessionEvent::OfferReceived),
            Err(SessionError::UnknownSession(42))
        );
    }
}
