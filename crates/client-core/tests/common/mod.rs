//! Shared setup for client-core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use phonekit_audio_core::testing::TestAudioContext;
use phonekit_client_core::testing::{MockMediaCapture, MockSession, MockUserAgent};
use phonekit_client_core::{CallId, ClientBuilder, ClientConfig, ClientEvent, ClientManager, SessionEvent};
use phonekit_infra_common::events::EventRecorder;

pub struct Harness {
    pub client: ClientManager,
    pub audio: Arc<TestAudioContext>,
    pub capture: Arc<MockMediaCapture>,
    pub user_agent: Arc<MockUserAgent>,
    pub recorder: EventRecorder<ClientEvent>,
    /// Stands in for the signaling stack, which owns the sessions
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("phonekit_client_core=debug,phonekit_audio_core=info")
            .with_test_writer()
            .try_init();

        let audio = Arc::new(TestAudioContext::new());
        let capture = MockMediaCapture::new();
        let user_agent = MockUserAgent::new();
        let client = ClientBuilder::new()
            .config(config)
            .audio_context(audio.clone())
            .media_capture(capture.clone())
            .user_agent(user_agent.clone())
            .build()
            .expect("Failed to build client");
        let recorder = EventRecorder::attach(client.events());

        Self {
            client,
            audio,
            capture,
            user_agent,
            recorder,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Offer an incoming session and return its call
    pub fn incoming(&self, id: &str) -> (Arc<MockSession>, CallId) {
        let session = MockSession::incoming(id);
        self.sessions.lock().push(session.clone());
        let call_id = self.client.on_new_session(session.clone());
        (session, call_id)
    }

    /// Offer an incoming session that is already confirmed
    pub fn established(&self, id: &str) -> (Arc<MockSession>, CallId) {
        let (session, call_id) = self.incoming(id);
        self.confirm(&session);
        (session, call_id)
    }

    pub fn confirm(&self, session: &MockSession) {
        use phonekit_client_core::SignalingSession;
        session.establish();
        self.client.handle_session_event(&session.id(), SessionEvent::Confirmed);
    }

    pub fn end(&self, session: &MockSession) {
        use phonekit_client_core::SignalingSession;
        let event = session.end("Bye");
        self.client.handle_session_event(&session.id(), event);
    }

    pub fn primary(&self) -> Option<CallId> {
        self.client.primary_call_id()
    }

    /// Exactly one primary call whenever calls exist
    pub fn assert_single_primary(&self) {
        let calls = self.client.list_calls();
        let primaries = calls.iter().filter(|c| c.primary).count();
        if calls.is_empty() {
            assert_eq!(primaries, 0);
        } else {
            assert_eq!(primaries, 1, "calls: {:?}", calls);
        }
    }
}
