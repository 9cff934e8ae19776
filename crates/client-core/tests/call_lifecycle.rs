//! Integration tests for call lifecycle operations
//!
//! Placing, answering, cancelling and ending calls, failure cleanup and the
//! signaling event loop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use phonekit_audio_core::MediaTrack;
use phonekit_client_core::testing::MockSession;
use phonekit_client_core::{
    CallDirection, CallState, ClientBuilder, ClientConfig, ClientError, ClientEvent, Originator, SessionEvent,
    SignalingError, SignalingEvent, SignalingSession,
};
use serial_test::serial;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_make_call_registers_outgoing_call() {
    let h = Harness::new();
    let call_id = h.client.make_call("sip:bob@example.com").await.unwrap();

    let info = h.client.call_info(call_id).unwrap();
    assert_eq!(info.state, CallState::Originating);
    assert_eq!(info.direction, CallDirection::Originating);
    assert!(info.primary);

    let session = h.user_agent.last_session().unwrap();
    assert_eq!(session.peer().sender_ids(), vec!["mic-0".to_string()]);
    assert_eq!(info.local_track_count, 1);
    assert!(!h.client.audio().is_ringing());
}

#[tokio::test]
async fn test_outgoing_call_established_on_confirm() {
    let h = Harness::new();
    let call_id = h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();
    h.recorder.clear();

    h.client.handle_session_event(&session.id(), SessionEvent::Progress);
    h.confirm(&session);

    let info = h.client.call_info(call_id).unwrap();
    assert_eq!(info.state, CallState::Established);
    assert!(info.established_at.is_some());
    assert_eq!(h.recorder.topics(), vec!["call.progress", "call.established"]);
}

#[tokio::test]
async fn test_media_failure_leaves_no_call() {
    let h = Harness::new();
    h.capture.fail_with(Some("permission denied"));

    let err = h.client.make_call("sip:bob@example.com").await.unwrap_err();
    assert_eq!(err, ClientError::MediaAcquisition { reason: "permission denied".into() });
    assert!(h.client.list_calls().is_empty());
    assert!(h.user_agent.sessions().is_empty());
    assert_eq!(h.recorder.count("call.removed"), 1);
    assert_eq!(h.recorder.count("call.failed"), 1);
}

#[tokio::test]
async fn test_media_failure_restores_previous_primary() {
    let h = Harness::new();
    let (first, first_id) = h.established("a");
    h.capture.fail_with(Some("device busy"));

    assert!(h.client.make_call("sip:bob@example.com").await.is_err());
    assert_eq!(h.client.primary_call_id(), Some(first_id));
    assert!(!first.status().local_hold);
}

#[tokio::test]
async fn test_signaling_failure_is_passed_through() {
    let h = Harness::new();
    let rejected = SignalingError::new("Forbidden").with_status(403);
    h.user_agent.fail_with(Some(rejected.clone()));

    let err = h.client.make_call("sip:bob@example.com").await.unwrap_err();
    assert_eq!(err, ClientError::Signaling(rejected));
    assert!(h.client.list_calls().is_empty());
    assert_eq!(h.capture.live_tracks(), 0);
}

#[tokio::test]
async fn test_make_call_without_user_agent() {
    let client = ClientBuilder::new()
        .audio_context(Arc::new(phonekit_audio_core::testing::TestAudioContext::new()))
        .media_capture(phonekit_client_core::testing::MockMediaCapture::new())
        .build()
        .unwrap();

    let err = client.make_call("sip:bob@example.com").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidConfiguration { .. }));
    assert!(client.list_calls().is_empty());
}

#[test]
fn test_builder_requires_collaborators() {
    let err = ClientBuilder::new().build().unwrap_err();
    assert!(matches!(err, ClientError::InvalidConfiguration { ref field, .. } if field == "audio_context"));

    let err = ClientBuilder::new()
        .audio_context(Arc::new(phonekit_audio_core::testing::TestAudioContext::new()))
        .config(ClientConfig::default().with_dtmf_duration_ms(0))
        .media_capture(phonekit_client_core::testing::MockMediaCapture::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidConfiguration { .. }));
}

#[tokio::test]
async fn test_cancel_while_acquiring_media() {
    let h = Harness::new();
    h.capture.delay(Duration::from_millis(50));
    let client = h.client.clone();
    let pending = tokio::spawn(async move { client.make_call("sip:bob@example.com").await });
    tokio::task::yield_now().await;
    assert_eq!(h.client.list_calls().len(), 1);

    h.client.cancel().unwrap();
    assert!(h.client.list_calls().is_empty());

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ClientError::CallNotFound { .. })));
    assert!(h.user_agent.sessions().is_empty());
    assert_eq!(h.capture.live_tracks(), 0);
}

#[tokio::test]
async fn test_answer_incoming_call() {
    let h = Harness::new();
    let (session, call_id) = h.incoming("a");
    assert!(h.client.audio().is_ringing());

    h.client.answer().await.unwrap();
    assert_eq!(session.count("answer"), 1);
    assert!(!h.client.audio().is_ringing());
    assert_eq!(session.peer().sender_ids(), vec!["mic-0".to_string()]);

    h.confirm(&session);
    assert_eq!(h.client.call_info(call_id).unwrap().state, CallState::Established);
    assert_eq!(h.recorder.count("call.ringing.stopped"), 1);
}

#[tokio::test]
async fn test_answer_with_video_when_configured() {
    let h = Harness::with_config(ClientConfig::default().with_video(true, false));
    let (session, _) = h.incoming("a");

    h.client.answer().await.unwrap();
    assert_eq!(session.peer().sender_ids(), vec!["mic-0".to_string(), "cam-0".to_string()]);
}

#[tokio::test]
async fn test_answer_without_ringing_call_is_noop() {
    let h = Harness::new();
    h.client.answer().await.unwrap();

    let (session, _) = h.established("a");
    h.client.answer().await.unwrap();
    assert_eq!(session.count("answer"), 0);
    assert!(h.capture.issued().is_empty());
}

#[tokio::test]
async fn test_answer_rejected_releases_media() {
    let h = Harness::new();
    let (session, _) = h.incoming("a");
    session.fail("answer");

    let err = h.client.answer().await.unwrap_err();
    assert!(matches!(err, ClientError::Signaling(_)));
    assert_eq!(h.capture.live_tracks(), 0);
    assert!(h.client.audio().is_ringing());
    assert_eq!(h.recorder.count("client.error"), 1);
}

#[tokio::test]
async fn test_two_incoming_calls_share_ringer() {
    let h = Harness::new();
    let (first, _) = h.incoming("a");
    let (second, _) = h.incoming("b");
    assert_eq!(h.audio.started_oscillators().len(), 2);

    h.end(&first);
    assert!(h.client.audio().is_ringing());
    h.end(&second);
    assert!(!h.client.audio().is_ringing());
}

#[tokio::test]
async fn test_remote_end_tears_down_call() {
    let h = Harness::new();
    let call_id = h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();
    h.confirm(&session);
    h.recorder.clear();

    h.end(&session);
    assert!(h.client.call_info(call_id).is_err());
    assert!(h.client.primary_call().is_none());
    assert_eq!(h.capture.live_tracks(), 0);

    let events = h.recorder.events();
    assert!(matches!(&events[0], ClientEvent::CallEnded { cause, .. } if cause == "Bye"));
    assert_eq!(h.recorder.topics()[1..], ["call.removed"]);
}

#[tokio::test]
async fn test_failed_session_reports_call_failed() {
    let h = Harness::new();
    let (session, call_id) = h.incoming("a");
    h.client.handle_session_event(
        &session.id(),
        SessionEvent::Failed { originator: Originator::Remote, cause: "Busy".into() },
    );

    assert!(h.client.list_calls().is_empty());
    assert!(!h.client.audio().is_ringing());
    assert!(h.recorder.events().contains(&ClientEvent::CallFailed { call_id, cause: "Busy".into() }));
}

#[tokio::test]
async fn test_events_for_unknown_session_are_ignored() {
    let h = Harness::new();
    h.client.handle_session_event("nobody", SessionEvent::Confirmed);
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn test_hangup_and_cancel_policies() {
    let h = Harness::new();
    // Nothing to act on
    h.client.hangup().unwrap();
    h.client.cancel().unwrap();

    let (session, _) = h.established("a");
    h.client.cancel().unwrap();
    assert_eq!(session.count("terminate"), 0);

    h.client.hangup().unwrap();
    assert_eq!(session.count("terminate"), 1);
}

#[tokio::test]
async fn test_mute_controls() {
    let h = Harness::new();
    let (session, call_id) = h.established("a");

    h.client.mute().unwrap();
    h.client.mute().unwrap();
    assert_eq!(session.count("mute"), 1);
    assert!(h.client.call_info(call_id).unwrap().mute.audio);

    h.client.toggle_mute().unwrap();
    assert!(!session.status().audio_muted);
    h.client.handle_session_event(&session.id(), SessionEvent::Unmuted { audio: true, video: false });
    assert_eq!(h.recorder.count("call.mute"), 1);
}

#[tokio::test]
async fn test_hold_rejection_is_surfaced() {
    let h = Harness::new();
    let (session, _) = h.established("a");
    session.fail("hold");

    let err = h.client.hold().unwrap_err();
    assert_eq!(err.category(), "signaling");
    assert!(!session.status().local_hold);
    assert_eq!(h.recorder.count("client.error"), 1);
}

#[tokio::test]
async fn test_incoming_dtmf_info_and_refer_pass_through() {
    let h = Harness::new();
    let (session, call_id) = h.established("a");
    h.recorder.clear();

    let id = session.id();
    h.client.handle_session_event(&id, SessionEvent::NewDtmf { originator: Originator::Remote, tone: "5".into() });
    h.client.handle_session_event(
        &id,
        SessionEvent::NewInfo {
            originator: Originator::Remote,
            content_type: "application/json".into(),
            body: "{}".into(),
        },
    );
    h.client.handle_session_event(&id, SessionEvent::Refer { target: "sip:carol@example.com".into() });

    assert_eq!(h.recorder.topics(), vec!["call.dtmf", "call.info", "call.refer"]);
    assert_eq!(
        h.recorder.events()[2],
        ClientEvent::ReferReceived { call_id, target: "sip:carol@example.com".into() }
    );
}

#[tokio::test]
#[serial]
async fn test_run_loop_drives_signaling_events() {
    let h = Harness::new();
    let (tx, rx) = mpsc::channel(16);
    let client = h.client.clone();
    let worker = tokio::spawn(async move { client.run(rx).await });

    let session = MockSession::incoming("loop");
    tx.send(SignalingEvent::NewSession(session.clone())).await.unwrap();
    session.establish();
    tx.send(SignalingEvent::Session { session_id: session.id(), event: SessionEvent::Confirmed })
        .await
        .unwrap();
    tx.send(SignalingEvent::OutputDeviceChanged { device_id: "speakers".into() })
        .await
        .unwrap();
    drop(tx);
    worker.await.unwrap();

    let info = h.client.primary_call().unwrap();
    assert_eq!(info.state, CallState::Established);
    assert!(h.client.audio().channels().iter().filter(|c| c.kind.has_sink()).all(|c| c.sink_id.as_deref() == Some("speakers")));
}

#[tokio::test]
async fn test_shutdown_hangs_up_everything() {
    let h = Harness::new();
    let (first, _) = h.established("a");
    let (second, _) = h.incoming("b");

    h.client.shutdown();
    assert!(h.client.list_calls().is_empty());
    assert_eq!(first.count("terminate"), 1);
    assert_eq!(second.count("terminate"), 1);
    assert!(!h.client.audio().is_ringing());
}

#[tokio::test]
async fn test_shutdown_does_not_resume_background_calls() {
    let h = Harness::new();
    let (first, first_id) = h.established("a");
    let (second, _) = h.established("b");
    h.client.switch_call(first_id);
    assert!(second.status().local_hold);
    h.recorder.clear();

    h.client.shutdown();
    assert_eq!(second.count("unhold"), 0);
    assert_eq!(first.count("terminate"), 1);
    assert_eq!(second.count("terminate"), 1);
    assert_eq!(h.recorder.count("call.primary.promoted"), 0);
    assert_eq!(h.recorder.count("call.removed"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_answer_skips_call_that_lost_primary() {
    let h = Harness::new();
    let (first, first_id) = h.incoming("a");
    h.capture.delay(Duration::from_millis(100));

    let client = h.client.clone();
    let answering = tokio::spawn(async move { client.answer().await });
    tokio::task::yield_now().await;

    let (_second, second_id) = h.incoming("b");
    assert!(answering.await.unwrap().is_ok());

    assert_eq!(first.count("answer"), 0);
    assert_eq!(h.primary(), Some(second_id));
    assert_eq!(h.client.call_info(first_id).unwrap().state, CallState::Ringing);
    assert_eq!(h.capture.live_tracks(), 0);
}

#[tokio::test]
async fn test_stats_and_call_info_serialization() {
    let h = Harness::new();
    h.established("a");
    h.incoming("b");

    let stats = h.client.stats();
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.active_calls, 2);
    assert_eq!(stats.established_calls, 1);
    assert_eq!(stats.ringing_calls, 1);

    let info = h.client.primary_call().unwrap();
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["state"], "Ringing");
    assert_eq!(json["remote_identity"], "sip:b@example.com");
}

#[tokio::test]
async fn test_track_sync_is_idempotent() {
    let h = Harness::new();
    let (session, call_id) = h.established("a");
    session.peer().add_receiver(MediaTrack::audio("remote"));

    h.client.handle_session_event(&session.id(), SessionEvent::PeerConnectionReady);
    h.client.handle_session_event(&session.id(), SessionEvent::PeerConnectionReady);
    assert_eq!(h.client.call_info(call_id).unwrap().remote_track_count, 1);
    assert_eq!(h.recorder.count("call.tracks"), 1);
}
