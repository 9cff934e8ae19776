//! Error types for the audio engine

use thiserror::Error;

use crate::channel::ChannelKind;

/// Result type for audio operations
pub type AudioResult<T> = std::result::Result<T, AudioError>;

/// Audio engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// A channel sink could not be pointed at the requested device
    #[error("Failed to route {channel} channel to device {device_id}: {reason}")]
    SinkFailed {
        channel: ChannelKind,
        device_id: String,
        reason: String,
    },

    /// The audio backend rejected an operation
    #[error("Audio backend error during {operation}: {reason}")]
    BackendError {
        operation: String,
        reason: String,
    },

    /// Character is not one of 0-9, A-D, * or #
    #[error("Invalid DTMF tone: {tone:?}")]
    InvalidDtmf { tone: char },

    /// Tone request with no usable frequencies or duration
    #[error("Invalid tone request: {reason}")]
    InvalidTone { reason: String },

    /// Track is not usable as an audio source
    #[error("Track {track_id} cannot be used as an audio source: {reason}")]
    InvalidTrack { track_id: String, reason: String },

    /// Timed operations need a tokio runtime
    #[error("No tokio runtime available to schedule {operation}")]
    NoRuntime { operation: String },

    /// Configuration rejected by validation
    #[error("Invalid audio configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl AudioError {
    /// Helper for backend failures
    pub fn backend(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        AudioError::BackendError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
