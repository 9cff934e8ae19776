//! # phonekit - the call-handling core of a softphone
//!
//! phonekit coordinates calls on top of an external signaling stack and
//! drives local audio output: ringing, DTMF and tones, the remote party's
//! audio and a preview self-test.
//!
//! ## Overview
//!
//! - **Infra Common**: typed event bus, configuration loading, logging setup
//! - **Audio Core**: five-channel audio engine over a pluggable audio backend
//! - **Client Core**: call lifecycle, primary-call arbitration and controls
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonekit::prelude::*;
//! use phonekit::audio_core::testing::TestAudioContext;
//! use phonekit::client_core::testing::{MockMediaCapture, MockUserAgent};
//!
//! # async fn example() -> Result<(), ClientError> {
//! let client = ClientBuilder::new()
//!     .audio_context(Arc::new(TestAudioContext::new()))
//!     .media_capture(MockMediaCapture::new())
//!     .user_agent(MockUserAgent::new())
//!     .build()?;
//!
//! client.make_call("sip:bob@example.com").await?;
//! client.hold()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`infra_common`]: event bus, configuration, logging
//! - [`audio_core`]: audio engine
//! - [`client_core`]: call coordination

#![warn(rust_2018_idioms)]

// Re-export all crates as modules
pub use phonekit_audio_core as audio_core;
pub use phonekit_client_core as client_core;
pub use phonekit_infra_common as infra_common;

/// Commonly used items
pub mod prelude {
    pub use crate::audio_core::{AudioConfig, AudioContext, AudioEngine, AudioEngineEvent, ChannelKind, MediaTrack, TrackKind};
    pub use crate::client_core::{
        CallDirection, CallId, CallInfo, CallState, ClientBuilder, ClientConfig, ClientError, ClientEvent, ClientManager,
        ClientResult, EventFilter, MediaCapture, MediaConstraints, SessionEvent, SignalingEvent, SignalingSession,
        SignalingUserAgent,
    };
    pub use crate::infra_common::events::{Event, EventBus, EventPriority};
    pub use crate::infra_common::logging::{LoggingConfig, setup_logging};
}

/// phonekit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
