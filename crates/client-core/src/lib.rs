//! Client-core: call coordination layer of a softphone
//!
//! ```text
//! client-core -> {audio-core, infra-common}
//!      ^
//!      └── signaling stack (SignalingSession / SignalingUserAgent), media capture
//! ```
//!
//! Client-core focuses on:
//! - Call lifecycle on top of an external signaling session
//! - Exactly one primary (audible) call among any number of live calls
//! - Hold, mute, blind transfer and DTMF on the primary call
//! - Track reconciliation and local track replacement
//! - Events for UI integration
//!
//! Signaling and media capture are collaborators supplied by the
//! application through the traits in [`session`] and [`media`].

pub mod call;
pub mod call_session;
pub mod client;
pub mod error;
pub mod events;
pub mod media;
pub mod registry;
pub mod session;
pub mod testing;
pub mod tracks;

pub use call::{CallDirection, CallId, CallInfo, CallState, ClientStats, HoldState, MuteState};
pub use call_session::{Call, CallContext, TrackSync};
pub use client::{ClientBuilder, ClientConfig, ClientManager};
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, EventFilter};
pub use media::{MediaCapture, MediaCaptureError, MediaConstraints};
pub use registry::CallRegistry;
pub use session::{
    Originator, PeerConnection, PeerConnectionState, SessionEvent, SessionId, SessionMediaOptions,
    SessionStatus, SignalingError, SignalingEvent, SignalingSession, SignalingUserAgent,
};
pub use tracks::{TrackBucket, TrackDiff};

/// Client-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
