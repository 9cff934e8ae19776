//! The client manager
//!
//! [`ClientManager`] owns the call registry, the audio engine and the
//! client event bus. Signaling callbacks enter through
//! [`ClientManager::handle_signaling_event`] (or [`ClientManager::run`]),
//! user actions through the controls in [`super::controls`].
//!
//! Every mutation of the registry happens under one lock that is never held
//! across an `.await`. Events produced by a mutation are published after the
//! lock is released, so handlers may call back into the manager.
//! Operations that suspend (media acquisition, sender replacement) look the
//! call up again after resuming and do nothing if it is gone.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use phonekit_audio_core::{AudioContext, AudioEngine, MediaTrack, OutputDeviceReport};
use phonekit_infra_common::events::{EventBus, SubscriptionId};

use crate::call::{CallId, CallInfo, CallState, ClientStats};
use crate::call_session::{Call, CallContext};
use crate::client::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventFilter};
use crate::media::{MediaCapture, MediaConstraints, release_tracks};
use crate::registry::CallRegistry;
use crate::session::{SessionEvent, SessionMediaOptions, SignalingEvent, SignalingSession, SignalingUserAgent};

struct ClientInner {
    config: ClientConfig,
    audio: AudioEngine,
    registry: Mutex<CallRegistry>,
    events: EventBus<ClientEvent>,
    capture: Arc<dyn MediaCapture>,
    user_agent: Option<Arc<dyn SignalingUserAgent>>,
    total_calls: AtomicU64,
}

/// Coordinates calls, media and audio for one softphone
#[derive(Clone)]
pub struct ClientManager {
    inner: Arc<ClientInner>,
}

impl ClientManager {
    /// Create a manager on top of an audio backend and a media source.
    ///
    /// Without a user agent the manager only handles incoming sessions.
    pub fn new(
        config: ClientConfig,
        audio_context: Arc<dyn AudioContext>,
        capture: Arc<dyn MediaCapture>,
        user_agent: Option<Arc<dyn SignalingUserAgent>>,
    ) -> ClientResult<Self> {
        config.check()?;
        let audio = AudioEngine::new(audio_context, config.audio.clone())?;

        info!(
            "Client manager created (auto-hold: {}, outgoing calls: {})",
            config.auto_hold_background_calls,
            user_agent.is_some()
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                audio,
                registry: Mutex::new(CallRegistry::new()),
                events: EventBus::new(),
                capture,
                user_agent,
                total_calls: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.inner.audio
    }

    /// Client event bus
    pub fn events(&self) -> &EventBus<ClientEvent> {
        &self.inner.events
    }

    /// Subscribe to the events matching `filter`
    pub fn subscribe_filtered<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner
            .events
            .subscribe_filtered(move |event: &ClientEvent| filter.matches(event), handler)
    }

    /// Run `f` on the registry, then publish the events it produced
    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut CallRegistry, &mut CallContext<'_>) -> R) -> R {
        let (result, events) = {
            let mut registry = self.inner.registry.lock();
            let mut cx = CallContext::new(&self.inner.audio, &self.inner.config);
            let result = f(&mut registry, &mut cx);
            (result, cx.into_events())
        };
        self.inner.events.publish_all(events);
        result
    }

    pub(crate) fn publish_error(&self, call_id: Option<CallId>, err: &ClientError) {
        self.inner.events.publish(&ClientEvent::Error {
            call_id,
            category: err.category(),
            message: err.to_string(),
        });
    }

    // ===== QUERIES =====

    pub fn list_calls(&self) -> Vec<CallInfo> {
        self.inner.registry.lock().iter().map(Call::info).collect()
    }

    pub fn call_info(&self, call_id: CallId) -> ClientResult<CallInfo> {
        self.inner
            .registry
            .lock()
            .get(call_id)
            .map(Call::info)
            .ok_or(ClientError::CallNotFound { call_id })
    }

    pub fn primary_call(&self) -> Option<CallInfo> {
        self.inner.registry.lock().primary().map(Call::info)
    }

    pub fn primary_call_id(&self) -> Option<CallId> {
        self.inner.registry.lock().primary_id()
    }

    pub fn stats(&self) -> ClientStats {
        let registry = self.inner.registry.lock();
        let states: Vec<CallState> = registry.iter().map(Call::state).collect();
        ClientStats {
            total_calls: self.inner.total_calls.load(Ordering::Relaxed),
            active_calls: states.len(),
            established_calls: states.iter().filter(|s| **s == CallState::Established).count(),
            ringing_calls: states.iter().filter(|s| **s == CallState::Ringing).count(),
        }
    }

    // ===== SIGNALING =====

    /// Register a session offered by the signaling stack and make it primary
    pub fn on_new_session(&self, session: Arc<dyn SignalingSession>) -> CallId {
        let session_id = session.id();
        let (call_id, created) = self.with_registry(|registry, cx| {
            if let Some(existing) = registry.find_by_session(&session_id) {
                return (existing, false);
            }
            let call_id = registry.add_call(Call::with_session(session), cx);
            if let Some(call) = registry.get_mut(call_id) {
                call.bind(cx);
            }
            (call_id, true)
        });

        if created {
            self.inner.total_calls.fetch_add(1, Ordering::Relaxed);
            info!("New session {} bound to call {}", session_id, call_id);
        } else {
            debug!("Session {} already bound to call {}", session_id, call_id);
        }
        call_id
    }

    /// Apply a session event to the call bound to `session_id`
    pub fn handle_session_event(&self, session_id: &str, event: SessionEvent) {
        self.with_registry(|registry, cx| {
            let Some(call_id) = registry.find_by_session(session_id) else {
                debug!("Event {:?} for unknown session {}", event, session_id);
                return;
            };
            let terminated = registry
                .get_mut(call_id)
                .is_some_and(|call| call.handle_session_event(event, cx));
            if terminated {
                registry.remove_call(call_id, cx);
            }
        });
    }

    /// Dispatch one event from the signaling stack
    pub async fn handle_signaling_event(&self, event: SignalingEvent) {
        match event {
            SignalingEvent::NewSession(session) => {
                self.on_new_session(session);
            }
            SignalingEvent::Session { session_id, event } => {
                self.handle_session_event(&session_id, event);
            }
            SignalingEvent::OutputDeviceChanged { device_id } => {
                self.set_output_device(&device_id);
            }
            SignalingEvent::LocalTrackChanged { track } => {
                if let Err(e) = self.replace_local_track(track).await {
                    warn!("Local track replacement failed: {}", e);
                }
            }
        }
    }

    /// Consume signaling events until the sender side is dropped
    pub async fn run(&self, mut events: mpsc::Receiver<SignalingEvent>) {
        info!("Client event loop started");
        while let Some(event) = events.recv().await {
            self.handle_signaling_event(event).await;
        }
        info!("Client event loop stopped");
    }

    // ===== CALLS =====

    /// Place an outgoing call to `target`.
    ///
    /// The call is registered (and becomes primary) before media is
    /// acquired. If acquisition or signaling fails the call is removed
    /// again, so no failed call stays behind.
    pub async fn make_call(&self, target: &str) -> ClientResult<CallId> {
        let user_agent = self
            .inner
            .user_agent
            .clone()
            .ok_or_else(|| ClientError::invalid_configuration("user_agent", "no signaling user agent configured"))?;

        let call_id = self.with_registry(|registry, cx| registry.add_call(Call::new(), cx));
        self.inner.total_calls.fetch_add(1, Ordering::Relaxed);
        info!("Placing call {} to {}", call_id, target);

        let constraints = MediaConstraints {
            video: self.inner.config.call_with_video,
            ..MediaConstraints::audio_only()
        };
        let tracks = match self.inner.capture.get_user_media(&constraints).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Media acquisition for call {} failed: {}", call_id, e);
                let err = ClientError::from(e);
                self.with_registry(|registry, cx| {
                    if registry.remove_call(call_id, cx).is_some() {
                        cx.emit(ClientEvent::CallFailed { call_id, cause: err.to_string() });
                    }
                });
                return Err(err);
            }
        };

        let video = self.inner.config.call_with_video;
        self.with_registry(|registry, cx| {
            let Some(call) = registry.get_mut(call_id) else {
                debug!("Call {} went away during media acquisition", call_id);
                release_tracks(&tracks);
                return Err(ClientError::CallNotFound { call_id });
            };

            let options = SessionMediaOptions { tracks: tracks.clone(), video };
            match user_agent.call(target, options) {
                Ok(session) => {
                    call.attach_session(session, tracks, cx);
                    Ok(call_id)
                }
                Err(e) => {
                    warn!("Call {} to {} failed: {}", call_id, target, e);
                    release_tracks(&tracks);
                    registry.remove_call(call_id, cx);
                    cx.emit(ClientEvent::CallFailed { call_id, cause: e.reason.clone() });
                    Err(e.into())
                }
            }
        })
    }

    /// Answer the primary call if it is ringing
    pub async fn answer(&self) -> ClientResult<()> {
        let ringing = self.with_registry(|registry, _| {
            registry
                .primary()
                .filter(|call| call.state() == CallState::Ringing)
                .map(Call::id)
        });
        let Some(call_id) = ringing else { return Ok(()) };

        let constraints = MediaConstraints {
            video: self.inner.config.answer_with_video,
            ..MediaConstraints::audio_only()
        };
        let tracks = self.inner.capture.get_user_media(&constraints).await.map_err(|e| {
            let err = ClientError::from(e);
            self.publish_error(Some(call_id), &err);
            err
        })?;

        let result = self.with_registry(|registry, cx| match registry.primary_mut() {
            Some(call) if call.id() == call_id => call.answer(tracks, cx).map(|_| ()),
            _ => {
                debug!("Call {} is no longer the ringing primary call, not answering", call_id);
                release_tracks(&tracks);
                Ok(())
            }
        });
        if let Err(e) = &result {
            self.publish_error(Some(call_id), e);
        }
        result
    }

    // ===== MEDIA =====

    /// Switch every call to a new local track of the same kind
    pub async fn replace_local_track(&self, track: MediaTrack) -> ClientResult<()> {
        let call_ids = self.with_registry(|registry, _| registry.ids());
        let results = join_all(call_ids.into_iter().map(|call_id| self.replace_call_track(call_id, track.clone()))).await;

        let mut first_error = None;
        for (call_id, result) in results {
            if let Err(e) = result {
                self.publish_error(Some(call_id), &e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn replace_call_track(&self, call_id: CallId, track: MediaTrack) -> (CallId, ClientResult<()>) {
        let prepared = self.with_registry(|registry, cx| match registry.get_mut(call_id) {
            Some(call) => call.prepare_local_track(&track, cx),
            None => Ok(None),
        });
        let pending = match prepared {
            Ok(Some(pending)) => pending,
            Ok(None) => return (call_id, Ok(())),
            Err(e) => return (call_id, Err(e)),
        };

        if let Err(e) = pending.peer.replace_sender_track(pending.current.id(), track).await {
            return (call_id, Err(e.into()));
        }

        self.with_registry(|registry, cx| match registry.get_mut(call_id) {
            Some(call) if call.replacement_still_valid(&pending) => call.complete_local_track(&pending, cx),
            _ => debug!("Call {} changed during track replacement", call_id),
        });
        (call_id, Ok(()))
    }

    /// Route every audio channel to `device_id`
    pub fn set_output_device(&self, device_id: &str) -> OutputDeviceReport {
        let report = self.inner.audio.set_output_device(device_id);
        if !report.is_complete() {
            error!("Output device {} not applied to {:?}", device_id, report.failed);
        }
        report
    }

    /// Hang up every call and release the audio graph
    pub fn shutdown(&self) {
        self.with_registry(|registry, cx| {
            for call_id in registry.ids() {
                if let Some(call) = registry.get_mut(call_id) {
                    if let Err(e) = call.hangup() {
                        warn!("Hangup of call {} during shutdown failed: {}", call_id, e);
                    }
                }
            }
            registry.clear(cx);
        });
        self.inner.audio.shutdown();
        info!("Client manager shut down");
    }
}

impl std::fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManager")
            .field("calls", &self.inner.registry.lock().len())
            .field("audio", &self.inner.audio)
            .finish()
    }
}
