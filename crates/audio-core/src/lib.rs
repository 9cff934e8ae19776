//! # Audio Core
//!
//! Audio mixing and ringing engine for phonekit.
//!
//! The engine keeps five gain-controlled channels (ringer, tones, remote,
//! preview and master) on top of an abstract [`AudioContext`] backend, runs a
//! ring duty cycle shared by any number of ring requests, synthesizes DTMF
//! and arbitrary multi-frequency tones, and offers a preview self-test (tone
//! and delayed microphone loopback) that needs no call.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonekit_audio_core::{AudioConfig, AudioEngine, ChannelKind};
//! use phonekit_audio_core::testing::TestAudioContext;
//!
//! # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AudioEngine::new(Arc::new(TestAudioContext::new()), AudioConfig::default())?;
//! engine.change_volume(ChannelKind::Ringer, 40.0);
//! engine.start_ringing(None);
//! engine.play_dtmf('5')?;
//! engine.stop_ringing(None);
//! # Ok(()) }
//! ```

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod testing;
pub mod tones;
pub mod track;

pub use channel::{AudioChannel, ChannelKind, ChannelSnapshot, volume_to_gain};
pub use config::AudioConfig;
pub use engine::{AudioEngine, OutputDeviceReport, RingKey};
pub use error::{AudioError, AudioResult};
pub use events::AudioEngineEvent;
pub use graph::{AudioContext, NodeId};
pub use tones::{ToneBuffer, dtmf_frequencies, is_valid_dtmf, synthesize};
pub use track::{MediaTrack, TrackKind};
