//! Local media acquisition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use phonekit_audio_core::MediaTrack;

use crate::error::ClientError;

/// What to capture
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    pub audio_device: Option<String>,
    pub video_device: Option<String>,
}

impl MediaConstraints {
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            ..Default::default()
        }
    }

    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
            ..Default::default()
        }
    }
}

/// Capture failure (permission denied, device missing, device busy)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct MediaCaptureError {
    pub reason: String,
}

impl MediaCaptureError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl From<MediaCaptureError> for ClientError {
    fn from(err: MediaCaptureError) -> Self {
        ClientError::MediaAcquisition { reason: err.reason }
    }
}

/// Supplies local media on demand
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Acquire live tracks matching `constraints`
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<Vec<MediaTrack>, MediaCaptureError>;
}

/// Stop every track of a stream that will not be used
pub(crate) fn release_tracks(tracks: &[MediaTrack]) {
    for track in tracks {
        track.stop();
    }
}
