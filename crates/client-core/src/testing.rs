//! In-memory signaling and media for tests
//!
//! [`MockSession`] applies commands to its status flags immediately and
//! records them, the way a real stack reports a request as accepted. Events
//! are never generated on their own: tests feed them to the manager with
//! [`ClientManager::handle_session_event`](crate::ClientManager::handle_session_event).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use phonekit_audio_core::{MediaTrack, TrackKind};

use crate::call::CallDirection;
use crate::media::{MediaCapture, MediaCaptureError, MediaConstraints};
use crate::session::{
    PeerConnection, PeerConnectionState, SessionEvent, SessionId, SessionMediaOptions, SessionStatus,
    SignalingError, SignalingSession, SignalingUserAgent,
};

/// Peer connection with scriptable senders and receivers
pub struct MockPeerConnection {
    state: Mutex<PeerConnectionState>,
    senders: Mutex<Vec<MediaTrack>>,
    receivers: Mutex<Vec<MediaTrack>>,
    replace_delay: Mutex<Option<Duration>>,
    fail_replace: Mutex<bool>,
}

impl MockPeerConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PeerConnectionState::Connected),
            senders: Mutex::new(Vec::new()),
            receivers: Mutex::new(Vec::new()),
            replace_delay: Mutex::new(None),
            fail_replace: Mutex::new(false),
        })
    }

    pub fn set_state(&self, state: PeerConnectionState) {
        *self.state.lock() = state;
    }

    pub fn close(&self) {
        self.set_state(PeerConnectionState::Closed);
    }

    pub fn add_receiver(&self, track: MediaTrack) {
        self.receivers.lock().push(track);
    }

    pub fn remove_receiver(&self, track_id: &str) {
        self.receivers.lock().retain(|t| t.id() != track_id);
    }

    /// Make `replace_sender_track` wait before completing
    pub fn delay_replacements(&self, delay: Duration) {
        *self.replace_delay.lock() = Some(delay);
    }

    pub fn fail_replacements(&self, fail: bool) {
        *self.fail_replace.lock() = fail;
    }

    pub fn sender_ids(&self) -> Vec<String> {
        self.senders.lock().iter().map(|t| t.id().to_string()).collect()
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    fn connection_state(&self) -> PeerConnectionState {
        *self.state.lock()
    }

    fn senders(&self) -> Vec<MediaTrack> {
        self.senders.lock().clone()
    }

    fn receivers(&self) -> Vec<MediaTrack> {
        self.receivers.lock().clone()
    }

    fn add_track(&self, track: MediaTrack) -> Result<(), SignalingError> {
        let mut senders = self.senders.lock();
        if !senders.iter().any(|t| t.id() == track.id()) {
            senders.push(track);
        }
        Ok(())
    }

    fn remove_track(&self, track_id: &str) -> Result<(), SignalingError> {
        self.senders.lock().retain(|t| t.id() != track_id);
        Ok(())
    }

    async fn replace_sender_track(&self, current_track_id: &str, track: MediaTrack) -> Result<(), SignalingError> {
        let delay = *self.replace_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_replace.lock() {
            return Err(SignalingError::new("sender rejected track"));
        }
        if self.connection_state().is_closed() {
            return Err(SignalingError::new("peer connection closed"));
        }

        let mut senders = self.senders.lock();
        match senders.iter_mut().find(|t| t.id() == current_track_id) {
            Some(slot) => {
                *slot = track;
                Ok(())
            }
            None => Err(SignalingError::new(format!("no sender for {}", current_track_id))),
        }
    }
}

/// Session whose commands flip its status flags and get recorded
pub struct MockSession {
    id: SessionId,
    direction: CallDirection,
    status: Mutex<SessionStatus>,
    peer: Arc<MockPeerConnection>,
    has_peer: Mutex<bool>,
    commands: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    remote_identity: Option<String>,
}

impl MockSession {
    fn build(id: &str, direction: CallDirection) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            direction,
            status: Mutex::new(SessionStatus::default()),
            peer: MockPeerConnection::new(),
            has_peer: Mutex::new(true),
            commands: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            remote_identity: Some(format!("sip:{}@example.com", id)),
        })
    }

    /// An unanswered incoming session
    pub fn incoming(id: &str) -> Arc<Self> {
        Self::build(id, CallDirection::Terminating)
    }

    /// An outgoing session that has not been answered yet
    pub fn outgoing(id: &str) -> Arc<Self> {
        Self::build(id, CallDirection::Originating)
    }

    /// An outgoing session that is already established
    pub fn established(id: &str) -> Arc<Self> {
        let session = Self::outgoing(id);
        session.establish();
        session
    }

    pub fn peer(&self) -> Arc<MockPeerConnection> {
        self.peer.clone()
    }

    /// Hide the peer connection, as before media negotiation
    pub fn detach_peer(&self) {
        *self.has_peer.lock() = false;
    }

    pub fn establish(&self) {
        self.status.lock().established = true;
    }

    pub fn set_remote_hold(&self, held: bool) {
        self.status.lock().remote_hold = held;
    }

    /// Make `command` ("hold", "refer", ...) fail from now on
    pub fn fail(&self, command: &'static str) {
        self.failing.lock().insert(command);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// How many recorded commands start with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Mark the session ended and return the matching event
    pub fn end(&self, cause: &str) -> SessionEvent {
        self.status.lock().ended = true;
        SessionEvent::Ended {
            originator: crate::session::Originator::Remote,
            cause: cause.to_string(),
        }
    }

    fn command(&self, name: &'static str, detail: Option<&str>) -> Result<(), SignalingError> {
        match detail {
            Some(detail) => self.commands.lock().push(format!("{}:{}", name, detail)),
            None => self.commands.lock().push(name.to_string()),
        }
        if self.failing.lock().contains(name) {
            return Err(SignalingError::new(format!("{} rejected", name)).with_status(488));
        }
        Ok(())
    }
}

impl SignalingSession for MockSession {
    fn id(&self) -> SessionId {
        self.id.clone()
    }

    fn direction(&self) -> CallDirection {
        self.direction
    }

    fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    fn remote_identity(&self) -> Option<String> {
        self.remote_identity.clone()
    }

    fn answer(&self, options: SessionMediaOptions) -> Result<(), SignalingError> {
        self.command("answer", None)?;
        for track in options.tracks {
            self.peer.add_track(track)?;
        }
        Ok(())
    }

    fn terminate(&self) -> Result<(), SignalingError> {
        self.command("terminate", None)?;
        self.status.lock().ended = true;
        Ok(())
    }

    fn hold(&self) -> Result<(), SignalingError> {
        self.command("hold", None)?;
        self.status.lock().local_hold = true;
        Ok(())
    }

    fn unhold(&self) -> Result<(), SignalingError> {
        self.command("unhold", None)?;
        self.status.lock().local_hold = false;
        Ok(())
    }

    fn mute(&self, audio: bool, video: bool) -> Result<(), SignalingError> {
        self.command("mute", None)?;
        let mut status = self.status.lock();
        status.audio_muted |= audio;
        status.video_muted |= video;
        Ok(())
    }

    fn unmute(&self, audio: bool, video: bool) -> Result<(), SignalingError> {
        self.command("unmute", None)?;
        let mut status = self.status.lock();
        status.audio_muted &= !audio;
        status.video_muted &= !video;
        Ok(())
    }

    fn refer(&self, target: &str) -> Result<(), SignalingError> {
        self.command("refer", Some(target))
    }

    fn send_dtmf(&self, tones: &str, _duration: Duration) -> Result<(), SignalingError> {
        self.command("dtmf", Some(tones))
    }

    fn renegotiate(&self) -> Result<(), SignalingError> {
        self.command("renegotiate", None)
    }

    fn peer_connection(&self) -> Option<Arc<dyn PeerConnection>> {
        if *self.has_peer.lock() {
            Some(self.peer.clone() as Arc<dyn PeerConnection>)
        } else {
            None
        }
    }
}

/// Media source handing out numbered tracks
pub struct MockMediaCapture {
    issued: Mutex<Vec<MediaTrack>>,
    counter: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockMediaCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            issued: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
        })
    }

    /// Fail every request with `reason`, or succeed again with `None`
    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failure.lock() = reason.map(str::to_string);
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Every track handed out so far
    pub fn issued(&self) -> Vec<MediaTrack> {
        self.issued.lock().clone()
    }

    pub fn live_tracks(&self) -> usize {
        self.issued.lock().iter().filter(|t| t.is_live()).count()
    }
}

#[async_trait]
impl MediaCapture for MockMediaCapture {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<Vec<MediaTrack>, MediaCaptureError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failure.lock().clone() {
            return Err(MediaCaptureError::new(reason));
        }

        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(format!("mic-{}", n), TrackKind::Audio, "Microphone"));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(format!("cam-{}", n), TrackKind::Video, "Camera"));
        }
        self.issued.lock().extend(tracks.iter().cloned());
        Ok(tracks)
    }
}

/// User agent creating [`MockSession`]s for outgoing calls
pub struct MockUserAgent {
    sessions: Mutex<Vec<Arc<MockSession>>>,
    failure: Mutex<Option<SignalingError>>,
}

impl MockUserAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        })
    }

    pub fn fail_with(&self, error: Option<SignalingError>) {
        *self.failure.lock() = error;
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().clone()
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions.lock().last().cloned()
    }
}

impl SignalingUserAgent for MockUserAgent {
    fn call(&self, target: &str, options: SessionMediaOptions) -> Result<Arc<dyn SignalingSession>, SignalingError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let mut sessions = self.sessions.lock();
        let session = MockSession::outgoing(&format!("out-{}-{}", sessions.len(), target));
        for track in options.tracks {
            session.peer.add_track(track)?;
        }
        sessions.push(session.clone());
        Ok(session)
    }
}
