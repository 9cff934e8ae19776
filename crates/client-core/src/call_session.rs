//! Call lifecycle state machine
//!
//! A [`Call`] holds a weak handle to its [`SignalingSession`] (the signaling
//! stack owns the session) and owns everything the client tracks for one
//! call: its stable id, primary flag, transfer
//! sub-state and local/remote track sets.
//!
//! ```text
//! Idle ──attach──► Originating ──confirmed──► Established ──ended/failed──► Terminated
//!                  Ringing ─────answer/confirmed──┘
//! ```
//!
//! Hold and mute are flags of the session, orthogonal to the state above.
//! Transfer is a sub-state entered with `transfer(None)`: the call is held
//! and dialed digits are collected as the transfer target.
//!
//! All methods run inside the registry's critical section and never block.
//! Side effects on the audio engine happen immediately; client events are
//! queued on the [`CallContext`] and published by the caller afterwards.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use phonekit_audio_core::{AudioEngine, MediaTrack, is_valid_dtmf};

use crate::call::{CallDirection, CallId, CallInfo, CallState, HoldState, MuteState};
use crate::client::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::media::release_tracks;
use crate::session::{PeerConnection, SessionEvent, SessionId, SessionMediaOptions, SignalingSession};
use crate::tracks::{TrackBucket, TrackDiff};

/// Environment of a call operation: the audio engine, the configuration
/// and the queue of events to publish once the operation completes.
pub struct CallContext<'a> {
    audio: &'a AudioEngine,
    config: &'a ClientConfig,
    events: Vec<ClientEvent>,
}

impl<'a> CallContext<'a> {
    pub fn new(audio: &'a AudioEngine, config: &'a ClientConfig) -> Self {
        Self {
            audio,
            config,
            events: Vec::new(),
        }
    }

    pub fn audio(&self) -> &AudioEngine {
        self.audio
    }

    pub fn config(&self) -> &ClientConfig {
        self.config
    }

    pub fn emit(&mut self, event: ClientEvent) {
        self.events.push(event);
    }

    /// Events queued so far
    pub fn events(&self) -> &[ClientEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ClientEvent> {
        self.events
    }

    fn report(&mut self, call_id: CallId, err: &ClientError) {
        self.events.push(ClientEvent::Error {
            call_id: Some(call_id),
            category: err.category(),
            message: err.to_string(),
        });
    }
}

/// Track changes made by [`Call::sync_tracks`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSync {
    pub local: TrackDiff,
    pub remote: TrackDiff,
}

impl TrackSync {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }
}

#[derive(Debug, Clone)]
struct TransferState {
    /// Local hold flag before the transfer started
    prior_hold: bool,
    /// Digits collected so far
    target: String,
}

/// Sender swap that has to wait on the peer connection
pub(crate) struct PendingReplacement {
    pub(crate) session_id: SessionId,
    pub(crate) peer: Arc<dyn PeerConnection>,
    pub(crate) current: MediaTrack,
}

/// One call
pub struct Call {
    id: CallId,
    /// Dropped by the signaling stack means the session is gone
    session: Option<Weak<dyn SignalingSession>>,
    direction: CallDirection,
    primary: bool,
    transfer: Option<TransferState>,
    /// Held by primary management rather than by the user
    auto_held: bool,
    ringing: bool,
    terminated: bool,
    local_identity: Option<String>,
    remote_identity: Option<String>,
    local_tracks: TrackBucket,
    remote_tracks: TrackBucket,
    /// Media we acquired for this call, stopped on teardown
    owned_media: Vec<MediaTrack>,
    created_at: DateTime<Utc>,
    established_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Call {
    /// An idle outgoing call without a session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            session: None,
            direction: CallDirection::Originating,
            primary: false,
            transfer: None,
            auto_held: false,
            ringing: false,
            terminated: false,
            local_identity: None,
            remote_identity: None,
            local_tracks: TrackBucket::new(),
            remote_tracks: TrackBucket::new(),
            owned_media: Vec::new(),
            created_at: Utc::now(),
            established_at: None,
            ended_at: None,
        }
    }

    /// A call for a session offered by the signaling stack
    pub fn with_session(session: Arc<dyn SignalingSession>) -> Self {
        let mut call = Self::new();
        call.direction = session.direction();
        call.local_identity = session.local_identity();
        call.remote_identity = session.remote_identity();
        call.session = Some(Arc::downgrade(&session));
        call
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    /// The session, while the signaling stack still holds it
    pub fn session(&self) -> Option<Arc<dyn SignalingSession>> {
        self.session.as_ref()?.upgrade()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session().map(|s| s.id())
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn in_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    /// Digits collected while transferring
    pub fn transfer_target(&self) -> Option<&str> {
        self.transfer.as_ref().map(|t| t.target.as_str())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing
    }

    /// Whether the call was held by primary management
    pub fn is_auto_held(&self) -> bool {
        self.auto_held
    }

    /// Has a session that has not ended
    pub fn has_live_session(&self) -> bool {
        self.session().is_some_and(|s| !s.status().ended)
    }

    pub fn is_established(&self) -> bool {
        self.session().is_some_and(|s| {
            let status = s.status();
            status.established && !status.ended
        })
    }

    pub fn hold_state(&self) -> HoldState {
        self.session()
            .map(|s| {
                let status = s.status();
                HoldState { local: status.local_hold, remote: status.remote_hold }
            })
            .unwrap_or_default()
    }

    pub fn mute_state(&self) -> MuteState {
        self.session()
            .map(|s| {
                let status = s.status();
                MuteState { audio: status.audio_muted, video: status.video_muted }
            })
            .unwrap_or_default()
    }

    pub fn state(&self) -> CallState {
        if self.terminated {
            return CallState::Terminated;
        }
        let Some(handle) = &self.session else {
            return CallState::Idle;
        };
        let Some(session) = handle.upgrade() else {
            return CallState::Terminated;
        };
        let status = session.status();
        if status.ended {
            CallState::Terminated
        } else if status.established {
            CallState::Established
        } else {
            match self.direction {
                CallDirection::Originating => CallState::Originating,
                CallDirection::Terminating => CallState::Ringing,
            }
        }
    }

    pub fn local_tracks(&self) -> &TrackBucket {
        &self.local_tracks
    }

    pub fn remote_tracks(&self) -> &TrackBucket {
        &self.remote_tracks
    }

    /// Snapshot for UI queries
    pub fn info(&self) -> CallInfo {
        CallInfo {
            call_id: self.id,
            state: self.state(),
            direction: self.direction,
            primary: self.primary,
            in_transfer: self.in_transfer(),
            hold: self.hold_state(),
            mute: self.mute_state(),
            local_identity: self.local_identity.clone(),
            remote_identity: self.remote_identity.clone(),
            local_track_count: self.local_tracks.len(),
            remote_track_count: self.remote_tracks.len(),
            created_at: self.created_at,
            established_at: self.established_at,
            ended_at: self.ended_at,
        }
    }

    /// Usable peer connection: a session is attached and its peer
    /// connection exists and is not closed
    fn peer_connection(&self) -> Option<Arc<dyn PeerConnection>> {
        let peer = self.session()?.peer_connection()?;
        if peer.connection_state().is_closed() {
            return None;
        }
        Some(peer)
    }

    // ===== LIFECYCLE =====

    /// Start call-specific side effects after the call joined the registry.
    ///
    /// An unanswered incoming call starts ringing.
    pub fn bind(&mut self, cx: &mut CallContext<'_>) {
        if self.state() == CallState::Ringing && !self.ringing {
            cx.audio.start_ringing(Some(self.id));
            self.ringing = true;
            info!("Call {} ringing", self.id);
            cx.emit(ClientEvent::RingingStarted { call_id: self.id });
        }
        self.sync_tracks(cx);
    }

    /// Attach the session of an outgoing call placed with `media`
    pub fn attach_session(&mut self, session: Arc<dyn SignalingSession>, media: Vec<MediaTrack>, cx: &mut CallContext<'_>) {
        info!("Call {} attached to session {}", self.id, session.id());
        self.direction = session.direction();
        self.local_identity = session.local_identity();
        self.remote_identity = session.remote_identity();
        self.session = Some(Arc::downgrade(&session));
        self.owned_media.extend(media);
        self.bind(cx);
    }

    /// Apply a signaling event. Returns true once the call is terminated.
    pub fn handle_session_event(&mut self, event: SessionEvent, cx: &mut CallContext<'_>) -> bool {
        if self.terminated {
            return true;
        }
        let id = self.id;

        match event {
            SessionEvent::Progress => {
                debug!("Call {} progress", id);
                cx.emit(ClientEvent::CallProgress { call_id: id });
            }
            SessionEvent::Confirmed => {
                self.stop_ringing(cx);
                self.established_at = Some(Utc::now());
                info!("Call {} established", id);
                cx.emit(ClientEvent::CallEstablished { call_id: id });
                self.sync_tracks(cx);
            }
            SessionEvent::Hold { originator } | SessionEvent::Unhold { originator } => {
                let hold = self.hold_state();
                info!("Call {} hold changed by {:?}: {:?}", id, originator, hold);
                cx.emit(ClientEvent::HoldChanged { call_id: id, originator, hold });
            }
            SessionEvent::Muted { .. } | SessionEvent::Unmuted { .. } => {
                let mute = self.mute_state();
                info!("Call {} mute changed: {:?}", id, mute);
                cx.emit(ClientEvent::MuteChanged { call_id: id, mute });
            }
            SessionEvent::NewDtmf { originator, tone } => {
                debug!("Call {} DTMF {:?} from {:?}", id, tone, originator);
                cx.emit(ClientEvent::DtmfReceived { call_id: id, originator, tone });
            }
            SessionEvent::NewInfo { content_type, body, .. } => {
                cx.emit(ClientEvent::InfoReceived { call_id: id, content_type, body });
            }
            SessionEvent::Refer { target } => {
                info!("Call {} received transfer request to {}", id, target);
                cx.emit(ClientEvent::ReferReceived { call_id: id, target });
            }
            SessionEvent::Ended { originator, cause } => {
                info!("Call {} ended by {:?}: {}", id, originator, cause);
                self.teardown(cx);
                cx.emit(ClientEvent::CallEnded { call_id: id, cause });
            }
            SessionEvent::Failed { originator, cause } => {
                warn!("Call {} failed ({:?}): {}", id, originator, cause);
                self.teardown(cx);
                cx.emit(ClientEvent::CallFailed { call_id: id, cause });
            }
            SessionEvent::PeerConnectionReady | SessionEvent::TracksChanged => {
                self.sync_tracks(cx);
            }
        }

        self.terminated
    }

    /// Release everything the call holds: ring request, remote audio,
    /// tracks and the session handle.
    pub(crate) fn teardown(&mut self, cx: &mut CallContext<'_>) {
        if self.terminated {
            return;
        }
        self.stop_ringing(cx);
        cx.audio.disconnect_remote(self.id);
        if self.transfer.take().is_some() {
            cx.emit(ClientEvent::TransferFailed {
                call_id: self.id,
                reason: "call ended".to_string(),
            });
        }

        // Sender tracks may be shared with other calls; only owned media is stopped
        self.local_tracks.clear();
        self.remote_tracks.stop_all();
        release_tracks(&self.owned_media);
        self.owned_media.clear();

        self.session = None;
        self.auto_held = false;
        self.terminated = true;
        self.ended_at = Some(Utc::now());
        debug!("Call {} torn down", self.id);
    }

    fn stop_ringing(&mut self, cx: &mut CallContext<'_>) {
        if self.ringing {
            cx.audio.stop_ringing(Some(self.id));
            self.ringing = false;
            cx.emit(ClientEvent::RingingStopped { call_id: self.id });
        }
    }

    // ===== TRACKS =====

    /// Reconcile local and remote tracks with the peer connection, then
    /// route remote audio according to the primary flag.
    ///
    /// Returns `None` when there is no usable peer connection.
    pub fn sync_tracks(&mut self, cx: &mut CallContext<'_>) -> Option<TrackSync> {
        let peer = self.peer_connection()?;

        let sync = TrackSync {
            local: self.local_tracks.sync(&peer.senders()),
            remote: self.remote_tracks.sync(&peer.receivers()),
        };

        if self.primary {
            self.wire_remote_audio(cx);
        } else {
            self.remote_tracks.set_enabled(false);
            cx.audio.disconnect_remote(self.id);
        }

        if !sync.is_empty() {
            debug!("Call {} tracks changed: {:?}", self.id, sync);
            cx.emit(ClientEvent::TracksChanged {
                call_id: self.id,
                local_added: sync.local.added.len(),
                local_removed: sync.local.removed.len(),
                remote_added: sync.remote.added.len(),
                remote_removed: sync.remote.removed.len(),
            });
        }
        Some(sync)
    }

    fn wire_remote_audio(&mut self, cx: &mut CallContext<'_>) {
        match self.remote_tracks.live_audio() {
            Some(track) => {
                if let Err(e) = cx.audio.connect_remote(self.id, track) {
                    warn!("Call {} remote audio not connected: {}", self.id, e);
                    cx.report(self.id, &ClientError::from(e));
                }
            }
            None => {
                cx.audio.disconnect_remote(self.id);
            }
        }
    }

    /// Start swapping the local sender of `track`'s kind.
    ///
    /// With no sender of that kind a new one is added right away and the
    /// session renegotiated, unless the call is on hold. An existing sender
    /// is returned as a [`PendingReplacement`] for the caller to await.
    pub(crate) fn prepare_local_track(
        &mut self,
        track: &MediaTrack,
        cx: &mut CallContext<'_>,
    ) -> ClientResult<Option<PendingReplacement>> {
        let Some(peer) = self.peer_connection() else { return Ok(None) };
        let Some(session) = self.session() else { return Ok(None) };

        match peer.senders().into_iter().find(|t| t.kind() == track.kind()) {
            Some(current) if current.id() == track.id() => Ok(None),
            Some(current) => Ok(Some(PendingReplacement {
                session_id: session.id(),
                peer,
                current,
            })),
            None => {
                peer.add_track(track.clone())?;
                if self.hold_state().any() {
                    debug!("Call {} on hold, renegotiation suppressed", self.id);
                } else {
                    session.renegotiate()?;
                }
                info!("Call {} added local {} track {}", self.id, track.kind(), track.id());
                self.sync_tracks(cx);
                Ok(None)
            }
        }
    }

    /// Whether a replacement prepared earlier still applies to this call
    pub(crate) fn replacement_still_valid(&self, pending: &PendingReplacement) -> bool {
        self.session_id().as_deref() == Some(pending.session_id.as_str())
            && !pending.peer.connection_state().is_closed()
    }

    /// Finish a sender swap after the peer connection accepted it
    pub(crate) fn complete_local_track(&mut self, pending: &PendingReplacement, cx: &mut CallContext<'_>) {
        if let Some(index) = self.owned_media.iter().position(|t| *t == pending.current) {
            self.owned_media.remove(index).stop();
        }
        info!("Call {} replaced local track {}", self.id, pending.current.id());
        self.sync_tracks(cx);
    }

    // ===== PRIMARY =====

    /// Make this the audible call
    pub fn promote(&mut self, cx: &mut CallContext<'_>) {
        if self.primary {
            return;
        }
        self.primary = true;
        self.remote_tracks.set_enabled(true);
        self.wire_remote_audio(cx);

        if self.auto_held {
            self.auto_held = false;
            if let Some(session) = self.session() {
                if session.status().local_hold {
                    if let Err(e) = session.unhold() {
                        warn!("Call {} could not be resumed: {}", self.id, e);
                        cx.report(self.id, &ClientError::from(e));
                    }
                }
            }
        }

        info!("Call {} promoted to primary", self.id);
        cx.emit(ClientEvent::PrimaryPromoted { call_id: self.id });
    }

    /// Move this call to the background
    pub fn demote(&mut self, cx: &mut CallContext<'_>) {
        if !self.primary {
            return;
        }
        self.primary = false;
        cx.audio.disconnect_remote(self.id);
        self.remote_tracks.set_enabled(false);

        if self.transfer.is_some() {
            self.fail_transfer("transfer cancelled", cx);
        }

        if cx.config.auto_hold_background_calls && self.is_established() && !self.hold_state().local {
            if let Some(session) = self.session() {
                match session.hold() {
                    Ok(()) => {
                        self.auto_held = true;
                        debug!("Call {} auto-held", self.id);
                    }
                    Err(e) => {
                        warn!("Call {} could not be auto-held: {}", self.id, e);
                        cx.report(self.id, &ClientError::from(e));
                    }
                }
            }
        }

        info!("Call {} demoted", self.id);
        cx.emit(ClientEvent::PrimaryDemoted { call_id: self.id });
    }

    /// Drop the primary flag of a call leaving the registry
    pub(crate) fn release_primary(&mut self, cx: &mut CallContext<'_>) {
        if self.primary {
            self.primary = false;
            cx.audio.disconnect_remote(self.id);
        }
    }

    // ===== CONTROLS =====

    /// Answer an incoming call with `media`. Returns false if there was
    /// nothing to answer; the media is then released.
    pub fn answer(&mut self, media: Vec<MediaTrack>, cx: &mut CallContext<'_>) -> ClientResult<bool> {
        let session = match self.session() {
            Some(session) if self.state() == CallState::Ringing => session,
            _ => {
                release_tracks(&media);
                return Ok(false);
            }
        };

        let options = SessionMediaOptions {
            tracks: media.clone(),
            video: cx.config.answer_with_video,
        };
        if let Err(e) = session.answer(options) {
            release_tracks(&media);
            return Err(e.into());
        }

        self.owned_media.extend(media);
        self.stop_ringing(cx);
        info!("Call {} answered", self.id);
        self.sync_tracks(cx);
        Ok(true)
    }

    /// Abandon a call that is not established yet
    pub fn cancel(&mut self) -> ClientResult<()> {
        match self.session() {
            Some(session) if self.state().is_in_progress() => {
                info!("Cancelling call {}", self.id);
                session.terminate()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn hangup(&mut self) -> ClientResult<()> {
        if let Some(session) = self.session() {
            info!("Hanging up call {}", self.id);
            session.terminate()?;
        }
        Ok(())
    }

    pub fn hold(&mut self) -> ClientResult<()> {
        let Some(session) = self.session() else { return Ok(()) };
        if !self.is_established() || self.hold_state().local {
            return Ok(());
        }
        session.hold()?;
        self.auto_held = false;
        info!("Call {} held", self.id);
        Ok(())
    }

    pub fn unhold(&mut self) -> ClientResult<()> {
        let Some(session) = self.session() else { return Ok(()) };
        if !self.hold_state().local {
            return Ok(());
        }
        session.unhold()?;
        self.auto_held = false;
        info!("Call {} resumed", self.id);
        Ok(())
    }

    pub fn toggle_hold(&mut self) -> ClientResult<()> {
        if self.hold_state().local {
            self.unhold()
        } else {
            self.hold()
        }
    }

    /// Mute local audio
    pub fn mute(&mut self) -> ClientResult<()> {
        let Some(session) = self.session() else { return Ok(()) };
        if self.mute_state().audio {
            return Ok(());
        }
        session.mute(true, false)?;
        info!("Call {} muted", self.id);
        Ok(())
    }

    pub fn unmute(&mut self) -> ClientResult<()> {
        let Some(session) = self.session() else { return Ok(()) };
        if !self.mute_state().audio {
            return Ok(());
        }
        session.unmute(true, false)?;
        info!("Call {} unmuted", self.id);
        Ok(())
    }

    pub fn toggle_mute(&mut self) -> ClientResult<()> {
        if self.mute_state().audio {
            self.unmute()
        } else {
            self.mute()
        }
    }

    /// Blind transfer.
    ///
    /// - `Some(target)`: refer the remote party to `target` now.
    /// - `None` while not transferring: hold the call and start collecting
    ///   the target from dialed digits.
    /// - `None` while collecting: refer to the collected digits.
    ///
    /// A failed transfer restores the hold state from before the transfer
    /// and emits `call.transfer.failed`.
    pub fn transfer(&mut self, target: Option<&str>, cx: &mut CallContext<'_>) -> ClientResult<()> {
        let Some(session) = self.session() else { return Ok(()) };
        if !self.is_established() {
            debug!("Transfer of call {} ignored: not established", self.id);
            return Ok(());
        }

        match target {
            Some(target) => self.complete_transfer(session.as_ref(), target.trim().to_string(), cx),
            None if self.transfer.is_none() => {
                let prior_hold = self.hold_state().local;
                if !prior_hold {
                    session.hold()?;
                }
                self.transfer = Some(TransferState {
                    prior_hold,
                    target: String::new(),
                });
                info!("Call {} collecting transfer target", self.id);
                cx.emit(ClientEvent::TransferStarted { call_id: self.id });
                Ok(())
            }
            None => {
                let collected = self.transfer.as_ref().map(|t| t.target.clone()).unwrap_or_default();
                self.complete_transfer(session.as_ref(), collected, cx)
            }
        }
    }

    fn complete_transfer(&mut self, session: &dyn SignalingSession, target: String, cx: &mut CallContext<'_>) -> ClientResult<()> {
        if target.is_empty() {
            self.fail_transfer("no transfer target", cx);
            return Ok(());
        }

        match session.refer(&target) {
            Ok(()) => {
                self.transfer = None;
                info!("Call {} transferred to {}", self.id, target);
                cx.emit(ClientEvent::TransferSucceeded { call_id: self.id, target });
                Ok(())
            }
            Err(e) => {
                self.fail_transfer(&e.reason, cx);
                Err(e.into())
            }
        }
    }

    fn fail_transfer(&mut self, reason: &str, cx: &mut CallContext<'_>) {
        let prior_hold = match self.transfer.take() {
            Some(state) => state.prior_hold,
            None => self.hold_state().local,
        };

        if let Some(session) = self.session() {
            let held = session.status().local_hold;
            let restored = match (prior_hold, held) {
                (false, true) => session.unhold(),
                (true, false) => session.hold(),
                _ => Ok(()),
            };
            if let Err(e) = restored {
                warn!("Call {} hold state not restored: {}", self.id, e);
                cx.report(self.id, &ClientError::from(e));
            }
        }

        warn!("Call {} transfer failed: {}", self.id, reason);
        cx.emit(ClientEvent::TransferFailed {
            call_id: self.id,
            reason: reason.to_string(),
        });
    }

    /// Send DTMF digits, playing each locally.
    ///
    /// While a transfer target is being collected the digits are appended
    /// to the target instead of being sent.
    pub fn send_dtmf(&mut self, digits: &str, cx: &mut CallContext<'_>) -> ClientResult<()> {
        if !is_valid_dtmf(digits) {
            return Err(ClientError::InvalidDtmf { digits: digits.to_string() });
        }
        let Some(session) = self.session() else { return Ok(()) };

        for tone in digits.chars() {
            if let Err(e) = cx.audio.play_dtmf(tone) {
                debug!("Local DTMF playback skipped: {}", e);
            }
        }

        if let Some(transfer) = &mut self.transfer {
            transfer.target.push_str(digits);
            let target = transfer.target.clone();
            debug!("Call {} transfer target now {}", self.id, target);
            cx.emit(ClientEvent::TransferTargetUpdated { call_id: self.id, target });
            return Ok(());
        }

        session.send_dtmf(digits, cx.config.dtmf_duration())?;
        debug!("Call {} sent DTMF {}", self.id, digits);
        Ok(())
    }
}

impl Default for Call {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("session", &self.session_id())
            .field("state", &self.state())
            .field("primary", &self.primary)
            .field("in_transfer", &self.in_transfer())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonekit_audio_core::testing::TestAudioContext;
    use phonekit_audio_core::AudioConfig;
    use crate::testing::MockSession;

    fn engine() -> AudioEngine {
        AudioEngine::new(Arc::new(TestAudioContext::new()), AudioConfig::default()).unwrap()
    }

    #[test]
    fn test_idle_call_defaults() {
        let call = Call::new();
        assert_eq!(call.state(), CallState::Idle);
        assert_eq!(call.direction(), CallDirection::Originating);
        assert!(!call.has_live_session());
        assert_eq!(call.hold_state(), HoldState::default());
    }

    #[test]
    fn test_controls_without_session_are_noops() {
        let audio = engine();
        let config = ClientConfig::default();
        let mut cx = CallContext::new(&audio, &config);
        let mut call = Call::new();

        assert!(call.hold().is_ok());
        assert!(call.mute().is_ok());
        assert!(call.hangup().is_ok());
        assert!(call.transfer(None, &mut cx).is_ok());
        assert!(!call.in_transfer());
        assert!(call.sync_tracks(&mut cx).is_none());
        assert!(cx.events().is_empty());
    }

    #[test]
    fn test_state_follows_session() {
        let session = MockSession::incoming("s1");
        let call = Call::with_session(session.clone());
        assert_eq!(call.state(), CallState::Ringing);

        session.establish();
        assert_eq!(call.state(), CallState::Established);
        assert!(call.is_established());
    }

    #[test]
    fn test_invalid_dtmf_rejected() {
        let audio = engine();
        let config = ClientConfig::default();
        let mut cx = CallContext::new(&audio, &config);
        let session = MockSession::established("s1");
        let mut call = Call::with_session(session.clone());

        let err = call.send_dtmf("12x", &mut cx).unwrap_err();
        assert!(matches!(err, ClientError::InvalidDtmf { .. }));
    }

    #[test]
    fn test_released_session_reads_as_terminated() {
        let session = MockSession::established("s1");
        let call = Call::with_session(session.clone());
        assert!(call.has_live_session());

        drop(session);
        assert!(call.session().is_none());
        assert_eq!(call.state(), CallState::Terminated);
        assert!(!call.has_live_session());
    }

    #[test]
    fn test_transfer_of_ringing_call_is_noop() {
        let audio = engine();
        let config = ClientConfig::default();
        let mut cx = CallContext::new(&audio, &config);
        let session = MockSession::incoming("s1");
        let mut call = Call::with_session(session.clone());

        assert!(call.transfer(None, &mut cx).is_ok());
        assert!(!call.in_transfer());
        assert!(session.commands().is_empty());
        assert!(cx.events().is_empty());
    }
}
