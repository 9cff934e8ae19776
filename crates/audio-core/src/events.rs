//! Events published by the audio engine

use uuid::Uuid;

use phonekit_infra_common::events::{Event, EventPriority, Topic};

use crate::channel::ChannelKind;

/// Audio engine state changes
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEngineEvent {
    /// A channel gain was changed
    VolumeChanged {
        channel: ChannelKind,
        volume: f32,
        gain: f32,
    },
    /// The ring set became non-empty
    RingerStarted { key: Option<Uuid> },
    /// The ring set emptied and the ringer was cut off
    RingerStopped,
    /// A call's remote audio was wired into the remote channel
    RemoteConnected { owner: Uuid, track_id: String },
    /// The remote channel source was removed
    RemoteDisconnected { owner: Uuid },
    /// A tone buffer started playing
    TonesStarted { frequencies: Vec<f32>, duration_secs: f64 },
    /// A tone source was stopped and disconnected
    TonesFinished { frequencies: Vec<f32> },
    /// The preview tone was toggled
    PreviewToneChanged { active: bool },
    /// The microphone loopback was toggled
    LoopbackChanged { active: bool },
    /// Channel sinks were re-pointed to a new output device
    OutputDeviceChanged {
        device_id: String,
        updated: Vec<ChannelKind>,
        failed: Vec<ChannelKind>,
    },
}

impl Event for AudioEngineEvent {
    fn topic(&self) -> Topic {
        match self {
            AudioEngineEvent::VolumeChanged { channel, .. } => match channel {
                ChannelKind::Ringer => "audioEngine.ringer.channel.volume",
                ChannelKind::Tones => "audioEngine.tones.channel.volume",
                ChannelKind::Remote => "audioEngine.remote.channel.volume",
                ChannelKind::Preview => "audioEngine.preview.channel.volume",
                ChannelKind::Master => "audioEngine.master.channel.volume",
            },
            AudioEngineEvent::RingerStarted { .. } => "audioEngine.ringer.started",
            AudioEngineEvent::RingerStopped => "audioEngine.ringer.stopped",
            AudioEngineEvent::RemoteConnected { .. } => "audioEngine.remote.connected",
            AudioEngineEvent::RemoteDisconnected { .. } => "audioEngine.remote.disconnected",
            AudioEngineEvent::TonesStarted { .. } => "audioEngine.tones.started",
            AudioEngineEvent::TonesFinished { .. } => "audioEngine.tones.finished",
            AudioEngineEvent::PreviewToneChanged { .. } => "audioEngine.preview.tone",
            AudioEngineEvent::LoopbackChanged { .. } => "audioEngine.preview.loopback",
            AudioEngineEvent::OutputDeviceChanged { .. } => "audioEngine.output.changed",
        }
    }

    fn priority(&self) -> EventPriority {
        match self {
            AudioEngineEvent::OutputDeviceChanged { failed, .. } if !failed.is_empty() => EventPriority::High,
            AudioEngineEvent::RingerStarted { .. } | AudioEngineEvent::RingerStopped => EventPriority::High,
            AudioEngineEvent::TonesStarted { .. } | AudioEngineEvent::TonesFinished { .. } => EventPriority::Low,
            _ => EventPriority::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_topics_are_per_channel() {
        for kind in ChannelKind::ALL {
            let event = AudioEngineEvent::VolumeChanged { channel: kind, volume: 1.0, gain: 0.01 };
            assert_eq!(event.topic(), format!("audioEngine.{}.channel.volume", kind));
        }
    }

    #[test]
    fn test_output_failure_priority() {
        let ok = AudioEngineEvent::OutputDeviceChanged {
            device_id: "usb".into(),
            updated: vec![ChannelKind::Master],
            failed: vec![],
        };
        let partial = AudioEngineEvent::OutputDeviceChanged {
            device_id: "usb".into(),
            updated: vec![],
            failed: vec![ChannelKind::Master],
        };
        assert_eq!(ok.priority(), EventPriority::Normal);
        assert_eq!(partial.priority(), EventPriority::High);
    }
}
