//! Gain-controlled output channels

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// The fixed set of engine channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Incoming-call ring tone
    Ringer,
    /// Locally played DTMF and progress tones
    Tones,
    /// Audio of the primary call's remote party
    Remote,
    /// Self-test tone and microphone loopback, mixed into master
    Preview,
    /// Master output bus
    Master,
}

impl ChannelKind {
    /// Every channel, in graph construction order
    pub const ALL: [ChannelKind; 5] = [
        ChannelKind::Ringer,
        ChannelKind::Tones,
        ChannelKind::Remote,
        ChannelKind::Master,
        ChannelKind::Preview,
    ];

    /// Name used in event topics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Ringer => "ringer",
            ChannelKind::Tones => "tones",
            ChannelKind::Remote => "remote",
            ChannelKind::Preview => "preview",
            ChannelKind::Master => "master",
        }
    }

    /// Whether the channel owns its own destination sink
    pub fn has_sink(&self) -> bool {
        !matches!(self, ChannelKind::Preview)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert an external volume into a gain value.
///
/// `gain = volume / volume_max`, clamped to `[min_gain, 1.0]`. Non-finite
/// volumes map to `min_gain`.
pub fn volume_to_gain(volume: f32, volume_max: f32, min_gain: f32) -> f32 {
    if !volume.is_finite() || volume_max <= 0.0 {
        return min_gain;
    }
    (volume / volume_max).clamp(min_gain, 1.0)
}

/// Per-channel state tracked by the engine
#[derive(Debug, Clone)]
pub struct AudioChannel {
    pub kind: ChannelKind,
    pub volume: f32,
    pub gain: f32,
    /// A source is currently wired into the channel
    pub connected: bool,
    pub gain_node: NodeId,
    pub destination: Option<NodeId>,
    pub sink_id: Option<String>,
}

impl AudioChannel {
    pub(crate) fn new(kind: ChannelKind, volume: f32, gain: f32, gain_node: NodeId, destination: Option<NodeId>) -> Self {
        Self {
            kind,
            volume,
            gain,
            connected: false,
            gain_node,
            destination,
            sink_id: None,
        }
    }

    /// Snapshot for callers outside the engine
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            kind: self.kind,
            volume: self.volume,
            gain: self.gain,
            connected: self.connected,
            sink_id: self.sink_id.clone(),
        }
    }
}

/// Read-only view of a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub kind: ChannelKind,
    pub volume: f32,
    pub gain: f32,
    pub connected: bool,
    pub sink_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_to_gain_scaling() {
        assert_eq!(volume_to_gain(25.0, 100.0, 0.0), 0.25);
        assert_eq!(volume_to_gain(100.0, 100.0, 0.0), 1.0);
        assert_eq!(volume_to_gain(250.0, 100.0, 0.0), 1.0);
    }

    #[test]
    fn test_volume_to_gain_floor() {
        assert_eq!(volume_to_gain(-10.0, 100.0, 0.0), 0.0);
        assert_eq!(volume_to_gain(-10.0, 100.0, 0.05), 0.05);
        assert_eq!(volume_to_gain(f32::NAN, 100.0, 0.05), 0.05);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(ChannelKind::Ringer.to_string(), "ringer");
        assert!(!ChannelKind::Preview.has_sink());
        assert!(ChannelKind::Master.has_sink());
    }
}
