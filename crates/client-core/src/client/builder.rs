//! Client builder for creating softphone clients

use std::sync::Arc;

use phonekit_audio_core::{AudioConfig, AudioContext};

use crate::client::config::ClientConfig;
use crate::client::manager::ClientManager;
use crate::error::{ClientError, ClientResult};
use crate::media::MediaCapture;
use crate::session::SignalingUserAgent;

/// Builder for creating a [`ClientManager`]
pub struct ClientBuilder {
    config: ClientConfig,
    audio_context: Option<Arc<dyn AudioContext>>,
    capture: Option<Arc<dyn MediaCapture>>,
    user_agent: Option<Arc<dyn SignalingUserAgent>>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            audio_context: None,
            capture: None,
            user_agent: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the audio engine settings
    pub fn audio_config(mut self, audio: AudioConfig) -> Self {
        self.config.audio = audio;
        self
    }

    /// Hold established calls that leave the foreground
    pub fn auto_hold(mut self, enabled: bool) -> Self {
        self.config.auto_hold_background_calls = enabled;
        self
    }

    /// Set the audio backend
    pub fn audio_context(mut self, context: Arc<dyn AudioContext>) -> Self {
        self.audio_context = Some(context);
        self
    }

    /// Set the local media source
    pub fn media_capture(mut self, capture: Arc<dyn MediaCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Set the signaling stack used for outgoing calls
    pub fn user_agent(mut self, user_agent: Arc<dyn SignalingUserAgent>) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Build the client
    pub fn build(self) -> ClientResult<ClientManager> {
        let audio_context = self
            .audio_context
            .ok_or_else(|| ClientError::invalid_configuration("audio_context", "an audio backend is required"))?;
        let capture = self
            .capture
            .ok_or_else(|| ClientError::invalid_configuration("media_capture", "a media source is required"))?;
        ClientManager::new(self.config, audio_context, capture, self.user_agent)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
