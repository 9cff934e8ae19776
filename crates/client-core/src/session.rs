//! Signaling collaborator interfaces
//!
//! The core never speaks SIP (or any other wire protocol) itself. A signaling
//! stack plugs in through three traits:
//!
//! - [`SignalingSession`]: one call's signaling dialog. Commands are
//!   requests: they update the session's status flags immediately and report
//!   progress later through [`SessionEvent`]s.
//! - [`PeerConnection`]: the media transport behind a session, exposing its
//!   sender and receiver tracks.
//! - [`SignalingUserAgent`]: originates outgoing sessions.
//!
//! Incoming sessions and per-session events reach the
//! [`ClientManager`](crate::ClientManager) as [`SignalingEvent`]s, either by
//! direct calls or through [`ClientManager::run`](crate::ClientManager::run).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use phonekit_audio_core::MediaTrack;

use crate::call::CallDirection;

/// Identifier the signaling stack assigns to a session
pub type SessionId = String;

/// Failure reported by the signaling collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct SignalingError {
    /// Protocol status code, when the failure came from the remote side
    pub status_code: Option<u16>,
    pub reason: String,
}

impl SignalingError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            status_code: None,
            reason: reason.into(),
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Timeouts and 5xx-style overload responses
    pub fn is_temporary(&self) -> bool {
        matches!(self.status_code, Some(408) | Some(480) | Some(486) | Some(500..=599))
    }
}

/// Status flags of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    pub established: bool,
    pub ended: bool,
    pub local_hold: bool,
    pub remote_hold: bool,
    pub audio_muted: bool,
    pub video_muted: bool,
}

/// Side that triggered a session event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Originator {
    Local,
    Remote,
    System,
}

/// Media handed to the session when answering or originating
#[derive(Debug, Clone, Default)]
pub struct SessionMediaOptions {
    pub tracks: Vec<MediaTrack>,
    pub video: bool,
}

/// Notifications raised by a [`SignalingSession`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Provisional progress (trying, ringing)
    Progress,
    /// The session is confirmed by both sides
    Confirmed,
    Hold { originator: Originator },
    Unhold { originator: Originator },
    Muted { audio: bool, video: bool },
    Unmuted { audio: bool, video: bool },
    /// DTMF received or sent in-band or via signaling
    NewDtmf { originator: Originator, tone: String },
    /// Out-of-dialog style info message
    NewInfo {
        originator: Originator,
        content_type: String,
        body: String,
    },
    /// The remote side asked us to transfer
    Refer { target: String },
    /// Normal end of the session
    Ended { originator: Originator, cause: String },
    /// The session failed to establish or broke
    Failed { originator: Originator, cause: String },
    /// The peer connection was created and can be inspected
    PeerConnectionReady,
    /// Senders or receivers of the peer connection changed
    TracksChanged,
}

impl SessionEvent {
    /// Whether the session is over after this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Ended { .. } | SessionEvent::Failed { .. })
    }
}

/// Connection state of a [`PeerConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, PeerConnectionState::Closed)
    }
}

/// Media transport behind a session
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn connection_state(&self) -> PeerConnectionState;

    /// Tracks currently attached to senders (local media)
    fn senders(&self) -> Vec<MediaTrack>;

    /// Tracks currently attached to receivers (remote media)
    fn receivers(&self) -> Vec<MediaTrack>;

    /// Attach a new sender for `track`
    fn add_track(&self, track: MediaTrack) -> Result<(), SignalingError>;

    /// Detach the sender carrying `track_id`
    fn remove_track(&self, track_id: &str) -> Result<(), SignalingError>;

    /// Swap the track of an existing sender without renegotiation
    async fn replace_sender_track(&self, current_track_id: &str, track: MediaTrack) -> Result<(), SignalingError>;
}

/// One call's signaling dialog
pub trait SignalingSession: Send + Sync {
    fn id(&self) -> SessionId;

    fn direction(&self) -> CallDirection;

    fn status(&self) -> SessionStatus;

    fn local_identity(&self) -> Option<String> {
        None
    }

    fn remote_identity(&self) -> Option<String> {
        None
    }

    fn answer(&self, options: SessionMediaOptions) -> Result<(), SignalingError>;

    fn terminate(&self) -> Result<(), SignalingError>;

    fn hold(&self) -> Result<(), SignalingError>;

    fn unhold(&self) -> Result<(), SignalingError>;

    fn mute(&self, audio: bool, video: bool) -> Result<(), SignalingError>;

    fn unmute(&self, audio: bool, video: bool) -> Result<(), SignalingError>;

    /// Ask the remote party to call `target` (blind transfer)
    fn refer(&self, target: &str) -> Result<(), SignalingError>;

    fn send_dtmf(&self, tones: &str, duration: Duration) -> Result<(), SignalingError>;

    /// Re-offer media after the local sender set changed
    fn renegotiate(&self) -> Result<(), SignalingError>;

    fn peer_connection(&self) -> Option<Arc<dyn PeerConnection>>;
}

impl fmt::Debug for dyn SignalingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingSession")
            .field("id", &self.id())
            .field("direction", &self.direction())
            .field("status", &self.status())
            .finish()
    }
}

/// Originates outgoing sessions
pub trait SignalingUserAgent: Send + Sync {
    fn call(&self, target: &str, options: SessionMediaOptions) -> Result<Arc<dyn SignalingSession>, SignalingError>;
}

/// Inputs of the client's event loop
#[derive(Clone)]
pub enum SignalingEvent {
    /// The signaling stack offered a new session (usually incoming)
    NewSession(Arc<dyn SignalingSession>),
    /// An event on an existing session
    Session {
        session_id: SessionId,
        event: SessionEvent,
    },
    /// The user picked another output device
    OutputDeviceChanged { device_id: String },
    /// The user picked another input device; the new track replaces the old
    LocalTrackChanged { track: MediaTrack },
}

impl fmt::Debug for SignalingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingEvent::NewSession(session) => f.debug_tuple("NewSession").field(&session.id()).finish(),
            SignalingEvent::Session { session_id, event } => f
                .debug_struct("Session")
                .field("session_id", session_id)
                .field("event", event)
                .finish(),
            SignalingEvent::OutputDeviceChanged { device_id } => f
                .debug_struct("OutputDeviceChanged")
                .field("device_id", device_id)
                .finish(),
            SignalingEvent::LocalTrackChanged { track } => f
                .debug_struct("LocalTrackChanged")
                .field("track", track)
                .finish(),
        }
    }
}
