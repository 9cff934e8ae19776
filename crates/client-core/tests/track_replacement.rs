//! Integration tests for track reconciliation and local track replacement

mod common;

use std::time::Duration;

use common::Harness;
use phonekit_audio_core::MediaTrack;
use phonekit_client_core::{ClientError, PeerConnection, SessionEvent, SignalingEvent, SignalingSession};

#[tokio::test]
async fn test_replacing_audio_swaps_existing_sender() {
    let h = Harness::new();
    let call_id = h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();
    let old = session.peer().senders()[0].clone();

    h.client.replace_local_track(MediaTrack::audio("headset")).await.unwrap();

    assert_eq!(session.peer().sender_ids(), vec!["headset".to_string()]);
    assert!(!old.is_live());
    assert_eq!(session.count("renegotiate"), 0);
    assert_eq!(h.client.call_info(call_id).unwrap().local_track_count, 1);
}

#[tokio::test]
async fn test_new_kind_is_added_and_renegotiated() {
    let h = Harness::new();
    h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();

    h.client.replace_local_track(MediaTrack::video("camera")).await.unwrap();
    assert_eq!(session.peer().sender_ids(), vec!["mic-0".to_string(), "camera".to_string()]);
    assert_eq!(session.count("renegotiate"), 1);
}

#[tokio::test]
async fn test_added_track_on_held_call_skips_renegotiation() {
    let h = Harness::new();
    let (session, _) = h.established("a");
    h.client.hold().unwrap();

    h.client.replace_local_track(MediaTrack::video("camera")).await.unwrap();
    assert_eq!(session.peer().sender_ids(), vec!["camera".to_string()]);
    assert_eq!(session.count("renegotiate"), 0);
}

#[tokio::test]
async fn test_replacement_on_closed_peer_connection_is_noop() {
    let h = Harness::new();
    h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();
    session.peer().close();
    h.recorder.clear();

    h.client.replace_local_track(MediaTrack::audio("headset")).await.unwrap();
    assert_eq!(session.peer().sender_ids(), vec!["mic-0".to_string()]);
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn test_replacement_without_peer_connection_is_noop() {
    let h = Harness::new();
    let (session, _) = h.incoming("a");
    session.detach_peer();

    h.client.replace_local_track(MediaTrack::audio("headset")).await.unwrap();
    assert!(session.peer().sender_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_call_ending_during_replacement_is_tolerated() {
    let h = Harness::new();
    h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();
    session.peer().delay_replacements(Duration::from_millis(200));

    let client = h.client.clone();
    let replacement = tokio::spawn(async move { client.replace_local_track(MediaTrack::audio("headset")).await });
    tokio::task::yield_now().await;

    h.end(&session);
    assert!(h.client.list_calls().is_empty());

    assert!(replacement.await.unwrap().is_ok());
    assert!(h.client.list_calls().is_empty());
    assert_eq!(h.recorder.count("call.tracks"), 1);
}

#[tokio::test]
async fn test_rejected_replacement_is_reported() {
    let h = Harness::new();
    let call_id = h.client.make_call("sip:bob@example.com").await.unwrap();
    let session = h.user_agent.last_session().unwrap();
    session.peer().fail_replacements(true);

    let err = h.client.replace_local_track(MediaTrack::audio("headset")).await.unwrap_err();
    assert!(matches!(err, ClientError::Signaling(_)));
    assert_eq!(h.recorder.count("client.error"), 1);
    assert!(session.peer().senders()[0].is_live());
    assert_eq!(h.client.call_info(call_id).unwrap().local_track_count, 1);
}

#[tokio::test]
async fn test_local_track_change_event_applies_to_all_calls() {
    let h = Harness::new();
    let (first, _) = h.established("a");
    let (second, _) = h.established("b");
    first.peer().add_track(MediaTrack::audio("mic-a")).unwrap();
    second.peer().add_track(MediaTrack::audio("mic-b")).unwrap();

    h.client
        .handle_signaling_event(SignalingEvent::LocalTrackChanged { track: MediaTrack::audio("usb") })
        .await;

    assert_eq!(first.peer().sender_ids(), vec!["usb".to_string()]);
    assert_eq!(second.peer().sender_ids(), vec!["usb".to_string()]);
}

#[tokio::test]
async fn test_remote_track_removal_disconnects_audio() {
    let h = Harness::new();
    let (session, call_id) = h.established("a");
    session.peer().add_receiver(MediaTrack::audio("remote"));
    h.client.handle_session_event(&session.id(), SessionEvent::TracksChanged);
    assert_eq!(h.client.audio().remote_owner(), Some(call_id));

    session.peer().remove_receiver("remote");
    h.client.handle_session_event(&session.id(), SessionEvent::TracksChanged);
    assert_eq!(h.client.audio().remote_owner(), None);
    assert_eq!(h.client.call_info(call_id).unwrap().remote_track_count, 0);
}

#[tokio::test]
async fn test_ending_one_call_keeps_shared_sender_live() {
    let h = Harness::new();
    let (first, _) = h.established("a");
    let (second, second_id) = h.established("b");
    first.peer().add_track(MediaTrack::audio("mic-a")).unwrap();
    second.peer().add_track(MediaTrack::audio("mic-b")).unwrap();

    h.client.replace_local_track(MediaTrack::audio("headset")).await.unwrap();
    assert_eq!(first.peer().sender_ids(), vec!["headset".to_string()]);
    assert_eq!(second.peer().sender_ids(), vec!["headset".to_string()]);

    h.end(&first);
    assert!(second.peer().senders()[0].is_live());
    assert_eq!(h.client.call_info(second_id).unwrap().local_track_count, 1);
}
