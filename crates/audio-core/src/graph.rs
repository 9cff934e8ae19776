//! Audio processing graph abstraction
//!
//! The engine never touches an audio backend directly. It builds and rewires
//! its graph through an [`AudioContext`], which hands out opaque [`NodeId`]s
//! for gain, oscillator, delay, buffer and stream source nodes plus one
//! destination per output sink.
//!
//! Times are expressed in seconds on the context's own clock
//! ([`AudioContext::current_time`]).

use std::fmt;

use crate::error::AudioResult;
use crate::tones::ToneBuffer;
use crate::track::MediaTrack;

/// Opaque handle to a node owned by an [`AudioContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Audio primitive backend
///
/// Implementations must be cheap to call from inside short critical sections:
/// none of these methods may block on I/O.
pub trait AudioContext: Send + Sync {
    /// Current time on the context clock, in seconds
    fn current_time(&self) -> f64;

    /// Create a gain node with an initial gain
    fn create_gain(&self, gain: f32) -> NodeId;

    /// Create a sine oscillator
    fn create_oscillator(&self, frequency: f32) -> NodeId;

    /// Create a delay line
    fn create_delay(&self, delay_secs: f64) -> NodeId;

    /// Create a one-shot source playing a pre-rendered buffer
    fn create_buffer_source(&self, buffer: ToneBuffer) -> NodeId;

    /// Create a source fed by a live media track
    fn create_stream_source(&self, track: &MediaTrack) -> AudioResult<NodeId>;

    /// Create a destination node bound to the default output sink
    fn create_destination(&self) -> NodeId;

    /// Route the output of `from` into `to`
    fn connect(&self, from: NodeId, to: NodeId);

    /// Remove every outgoing connection of `from`
    fn disconnect(&self, from: NodeId);

    /// Set a gain value at time `at`
    fn set_value_at(&self, node: NodeId, value: f32, at: f64);

    /// Exponential ramp of a gain value reaching `value` at time `end`
    fn exponential_ramp_to(&self, node: NodeId, value: f32, end: f64);

    /// Drop all scheduled automation on a node from time `from` on
    fn cancel_scheduled_values(&self, node: NodeId, from: f64);

    /// Start a source node at time `at`
    fn start(&self, node: NodeId, at: f64);

    /// Stop a source node at time `at`
    fn stop(&self, node: NodeId, at: f64);

    /// Point a destination node at an output device
    fn set_sink(&self, destination: NodeId, device_id: &str) -> AudioResult<()>;

    /// Release a node; the id must not be used afterwards
    fn release(&self, node: NodeId);
}
