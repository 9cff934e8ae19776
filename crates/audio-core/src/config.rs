//! Audio engine configuration

use std::time::Duration;
use serde::{Deserialize, Serialize};

use phonekit_infra_common::config::SelfValidating;
use phonekit_infra_common::errors::{Error as InfraError, Result as InfraResult};

use crate::channel::ChannelKind;
use crate::error::{AudioError, AudioResult};

/// Audio engine configuration
///
/// Every field has a default, so a partial TOML table is enough:
///
/// ```toml
/// volume_max = 10
/// ring_on_secs = 1.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Upper end of the external volume scale
    pub volume_max: f32,
    /// Lowest gain a channel can be set to
    pub min_gain: f32,
    /// Length of the audible ring phase
    pub ring_on_secs: f64,
    /// Length of the silent ring phase
    pub ring_off_secs: f64,
    /// Oscillator frequencies mixed into the ring tone
    pub ring_frequencies: Vec<f32>,
    /// Envelope value representing silence; exponential ramps cannot reach zero
    pub ring_envelope_floor: f32,
    /// Duration of locally played DTMF tones
    pub tone_duration_secs: f64,
    /// Sample rate of synthesized tones
    pub tone_sample_rate: u32,
    /// Extra time before a finished tone source is torn down
    pub tone_latency_margin_secs: f64,
    /// Frequency of the preview self-test tone
    pub preview_tone_frequency: f32,
    /// Delay applied to the microphone loopback
    pub loopback_delay_secs: f64,
    pub ringer_volume: f32,
    pub tones_volume: f32,
    pub remote_volume: f32,
    pub preview_volume: f32,
    pub master_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume_max: 100.0,
            min_gain: 0.0,
            ring_on_secs: 2.0,
            ring_off_secs: 4.0,
            ring_frequencies: vec![440.0, 480.0],
            ring_envelope_floor: 0.0001,
            tone_duration_secs: 0.15,
            tone_sample_rate: 8000,
            tone_latency_margin_secs: 0.1,
            preview_tone_frequency: 440.0,
            loopback_delay_secs: 0.5,
            ringer_volume: 100.0,
            tones_volume: 100.0,
            remote_volume: 100.0,
            preview_volume: 100.0,
            master_volume: 100.0,
        }
    }
}

impl AudioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume_max(mut self, volume_max: f32) -> Self {
        self.volume_max = volume_max;
        self
    }

    pub fn with_min_gain(mut self, min_gain: f32) -> Self {
        self.min_gain = min_gain;
        self
    }

    /// Set the ring cadence
    pub fn with_ring_cadence(mut self, on_secs: f64, off_secs: f64) -> Self {
        self.ring_on_secs = on_secs;
        self.ring_off_secs = off_secs;
        self
    }

    pub fn with_ring_frequencies(mut self, frequencies: Vec<f32>) -> Self {
        self.ring_frequencies = frequencies;
        self
    }

    pub fn with_tone_duration(mut self, secs: f64) -> Self {
        self.tone_duration_secs = secs;
        self
    }

    pub fn with_tone_latency_margin(mut self, secs: f64) -> Self {
        self.tone_latency_margin_secs = secs;
        self
    }

    pub fn with_loopback_delay(mut self, secs: f64) -> Self {
        self.loopback_delay_secs = secs;
        self
    }

    /// Set the initial volume of one channel
    pub fn with_channel_volume(mut self, kind: ChannelKind, volume: f32) -> Self {
        match kind {
            ChannelKind::Ringer => self.ringer_volume = volume,
            ChannelKind::Tones => self.tones_volume = volume,
            ChannelKind::Remote => self.remote_volume = volume,
            ChannelKind::Preview => self.preview_volume = volume,
            ChannelKind::Master => self.master_volume = volume,
        }
        self
    }

    /// Initial volume of a channel
    pub fn channel_volume(&self, kind: ChannelKind) -> f32 {
        match kind {
            ChannelKind::Ringer => self.ringer_volume,
            ChannelKind::Tones => self.tones_volume,
            ChannelKind::Remote => self.remote_volume,
            ChannelKind::Preview => self.preview_volume,
            ChannelKind::Master => self.master_volume,
        }
    }

    pub fn ring_on(&self) -> Duration {
        Duration::from_secs_f64(self.ring_on_secs)
    }

    pub fn ring_off(&self) -> Duration {
        Duration::from_secs_f64(self.ring_off_secs)
    }

    /// Time from a tone's start until its source is torn down
    pub fn tone_teardown_after(&self, duration_secs: f64) -> Duration {
        Duration::from_secs_f64(duration_secs + self.tone_latency_margin_secs)
    }

    /// Check the configuration, reporting the first offending field
    pub fn check(&self) -> AudioResult<()> {
        fn invalid(field: &str, reason: &str) -> AudioError {
            AudioError::InvalidConfiguration {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        if !(self.volume_max.is_finite() && self.volume_max > 0.0) {
            return Err(invalid("volume_max", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&self.min_gain) {
            return Err(invalid("min_gain", "must be between 0.0 and 1.0"));
        }
        if !(self.ring_on_secs.is_finite() && self.ring_on_secs > 0.0) {
            return Err(invalid("ring_on_secs", "must be positive"));
        }
        if !(self.ring_off_secs.is_finite() && self.ring_off_secs >= 0.0) {
            return Err(invalid("ring_off_secs", "must not be negative"));
        }
        if self.ring_frequencies.is_empty() {
            return Err(invalid("ring_frequencies", "at least one frequency is required"));
        }
        if self.ring_frequencies.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(invalid("ring_frequencies", "frequencies must be positive"));
        }
        if !(self.ring_envelope_floor > 0.0 && self.ring_envelope_floor < 1.0) {
            return Err(invalid("ring_envelope_floor", "must be strictly between 0 and 1"));
        }
        if !(self.tone_duration_secs.is_finite() && self.tone_duration_secs > 0.0) {
            return Err(invalid("tone_duration_secs", "must be positive"));
        }
        if self.tone_sample_rate == 0 {
            return Err(invalid("tone_sample_rate", "must be positive"));
        }
        if !(self.tone_latency_margin_secs.is_finite() && self.tone_latency_margin_secs >= 0.0) {
            return Err(invalid("tone_latency_margin_secs", "must not be negative"));
        }
        if !(self.loopback_delay_secs.is_finite() && self.loopback_delay_secs >= 0.0) {
            return Err(invalid("loopback_delay_secs", "must not be negative"));
        }
        Ok(())
    }
}

impl SelfValidating for AudioConfig {
    fn validate(&self) -> InfraResult<()> {
        self.check()
            .map_err(|e| InfraError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonekit_infra_common::config::from_toml_str;

    #[test]
    fn test_defaults_are_valid() {
        let config = AudioConfig::default();
        assert!(config.check().is_ok());
        assert_eq!(config.volume_max, 100.0);
        assert_eq!(config.ring_frequencies, vec![440.0, 480.0]);
        assert_eq!(config.tone_sample_rate, 8000);
    }

    #[test]
    fn test_partial_toml() {
        let config: AudioConfig = from_toml_str("volume_max = 10.0\nring_on_secs = 1.5").unwrap();
        assert_eq!(config.volume_max, 10.0);
        assert_eq!(config.ring_on_secs, 1.5);
        assert_eq!(config.ring_off_secs, 4.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AudioConfig::default().with_volume_max(0.0).check().is_err());
        assert!(AudioConfig::default().with_min_gain(1.5).check().is_err());
        assert!(AudioConfig::default().with_ring_frequencies(vec![]).check().is_err());

        let result: Result<AudioConfig, _> = from_toml_str("tone_sample_rate = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_channel_volume_builder() {
        let config = AudioConfig::default().with_channel_volume(ChannelKind::Ringer, 30.0);
        assert_eq!(config.channel_volume(ChannelKind::Ringer), 30.0);
        assert_eq!(config.channel_volume(ChannelKind::Master), 100.0);
    }
}
