use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

// Quick start from the crate docs: place a call, hold it, hang up
#[tokio::test]
#[serial]
async fn test_quick_start_call_flow() {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        use phonekit::audio_core::testing::TestAudioContext;
        use phonekit::client_core::testing::{MockMediaCapture, MockUserAgent};
        use phonekit::prelude::*;

        let user_agent = MockUserAgent::new();
        let client = ClientBuilder::new()
            .audio_context(Arc::new(TestAudioContext::new()))
            .media_capture(MockMediaCapture::new())
            .user_agent(user_agent.clone())
            .build()?;

        let call_id = client.make_call("sip:bob@example.com").await?;
        let session = user_agent.last_session().expect("session created");
        session.establish();
        client.handle_session_event(&session.id(), SessionEvent::Confirmed);

        client.hold()?;
        assert!(client.call_info(call_id)?.hold.local);

        client.hangup()?;
        assert!(session.status().ended);
        Ok::<_, ClientError>(())
    })
    .await;

    assert!(matches!(result, Ok(Ok(()))), "quick start failed: {:?}", result);
}

// Audio self-test without any call
#[tokio::test]
#[serial]
async fn test_preview_self_test() {
    use phonekit::audio_core::testing::TestAudioContext;
    use phonekit::prelude::*;

    let engine = AudioEngine::new(Arc::new(TestAudioContext::new()), AudioConfig::default()).unwrap();
    assert!(engine.toggle_preview_tone());
    assert!(engine.start_loopback(&MediaTrack::audio("mic")).unwrap());
    assert!(engine.is_loopback_active());
    assert!(!engine.toggle_preview_tone());
    engine.shutdown();
}

// Logging setup from a loaded client configuration
#[test]
#[serial]
fn test_init_logging_from_config() {
    use phonekit::prelude::*;

    let config = ClientConfig::from_toml("[logging]\nlevel = \"warn\"").unwrap();
    // Another test binary may already own the global subscriber
    let _ = setup_logging(&config.logging);
    assert_eq!(config.logging.level, "warn");
}
