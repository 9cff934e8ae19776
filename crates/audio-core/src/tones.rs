//! Tone synthesis
//!
//! Tones are rendered ahead of time into a multi-channel buffer: one channel
//! of `sin(2π·f·t)` per requested frequency, sampled at a fixed rate for
//! `t ∈ [0, duration)`. The engine plays the buffer once through the tones
//! channel.

use std::f64::consts::PI;

use crate::error::{AudioError, AudioResult};

/// Row frequencies of the DTMF keypad
pub const DTMF_ROW_FREQUENCIES: [f32; 4] = [697.0, 770.0, 852.0, 941.0];

/// Column frequencies of the DTMF keypad
pub const DTMF_COLUMN_FREQUENCIES: [f32; 4] = [1209.0, 1336.0, 1477.0, 1633.0];

const DTMF_KEYPAD: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Pre-rendered PCM buffer, one `Vec<f32>` per channel
#[derive(Debug, Clone, PartialEq)]
pub struct ToneBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl ToneBuffer {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Render `frequencies` into a buffer of `duration_secs` at `sample_rate`
pub fn synthesize(frequencies: &[f32], duration_secs: f64, sample_rate: u32) -> AudioResult<ToneBuffer> {
    if frequencies.is_empty() {
        return Err(AudioError::InvalidTone {
            reason: "no frequencies given".to_string(),
        });
    }
    if let Some(bad) = frequencies.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
        return Err(AudioError::InvalidTone {
            reason: format!("frequency {} is not a positive number", bad),
        });
    }
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return Err(AudioError::InvalidTone {
            reason: format!("duration {} is not a positive number", duration_secs),
        });
    }
    if sample_rate == 0 {
        return Err(AudioError::InvalidTone {
            reason: "sample rate must be positive".to_string(),
        });
    }

    let frame_count = (duration_secs * sample_rate as f64).round() as usize;
    let rate = sample_rate as f64;

    let channels = frequencies
        .iter()
        .map(|&frequency| {
            let omega = 2.0 * PI * frequency as f64;
            (0..frame_count)
                .map(|i| (omega * i as f64 / rate).sin() as f32)
                .collect()
        })
        .collect();

    Ok(ToneBuffer { sample_rate, channels })
}

/// Row and column frequencies for a DTMF key (`0-9`, `A-D`, `*`, `#`)
pub fn dtmf_frequencies(tone: char) -> AudioResult<[f32; 2]> {
    let key = tone.to_ascii_uppercase();
    for (row, keys) in DTMF_KEYPAD.iter().enumerate() {
        if let Some(column) = keys.iter().position(|k| *k == key) {
            return Ok([DTMF_ROW_FREQUENCIES[row], DTMF_COLUMN_FREQUENCIES[column]]);
        }
    }
    Err(AudioError::InvalidDtmf { tone })
}

/// True when every character of `digits` is a DTMF key
pub fn is_valid_dtmf(digits: &str) -> bool {
    !digits.is_empty() && digits.chars().all(|c| dtmf_frequencies(c).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_channel_per_frequency() {
        let buffer = synthesize(&[697.0, 1209.0], 0.15, 8000).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.len(), 1200);
        assert!((buffer.duration_secs() - 0.15).abs() < 1e-9);

        // sin(0) at the first sample of every channel
        assert_eq!(buffer.channels[0][0], 0.0);
        assert_eq!(buffer.channels[1][0], 0.0);
        assert!(buffer.channels.iter().flatten().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_synthesize_sample_values() {
        // 2000 Hz at 8 kHz: a quarter period per sample
        let buffer = synthesize(&[2000.0], 0.001, 8000).unwrap();
        assert_eq!(buffer.len(), 8);
        assert!((buffer.channels[0][1] - 1.0).abs() < 1e-5);
        assert!(buffer.channels[0][2].abs() < 1e-5);
        assert!((buffer.channels[0][3] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_synthesize_rejects_bad_input() {
        assert!(matches!(synthesize(&[], 0.1, 8000), Err(AudioError::InvalidTone { .. })));
        assert!(synthesize(&[-5.0], 0.1, 8000).is_err());
        assert!(synthesize(&[440.0], 0.0, 8000).is_err());
        assert!(synthesize(&[440.0], 0.1, 0).is_err());
    }

    #[test]
    fn test_dtmf_table() {
        assert_eq!(dtmf_frequencies('1').unwrap(), [697.0, 1209.0]);
        assert_eq!(dtmf_frequencies('0').unwrap(), [941.0, 1336.0]);
        assert_eq!(dtmf_frequencies('#').unwrap(), [941.0, 1477.0]);
        assert_eq!(dtmf_frequencies('d').unwrap(), [941.0, 1633.0]);
        assert_eq!(dtmf_frequencies('x'), Err(AudioError::InvalidDtmf { tone: 'x' }));
    }

    #[test]
    fn test_dtmf_validation() {
        assert!(is_valid_dtmf("0123456789*#ABCD"));
        assert!(!is_valid_dtmf(""));
        assert!(!is_valid_dtmf("12E"));
    }
}
