//! Client configuration
//!
//! [`ClientConfig`] bundles the audio engine settings with the call
//! coordination policy. Every field has a default, so configuration files
//! only need the values they change:
//!
//! ```toml
//! auto_hold_background_calls = false
//! dtmf_duration_ms = 120
//!
//! [audio]
//! volume_max = 10
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Load it with [`ClientConfig::load`] (TOML files plus `PHONEKIT_*`
//! environment overrides) or [`ClientConfig::from_toml`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use phonekit_audio_core::AudioConfig;
use phonekit_infra_common::config::{ConfigLoader, DEFAULT_ENV_PREFIX, SelfValidating, from_toml_str};
use phonekit_infra_common::errors::{Error as InfraError, Result as InfraResult};
use phonekit_infra_common::logging::{LoggingConfig, parse_log_level};

use crate::error::{ClientError, ClientResult};

/// Longest DTMF tone a session is asked to send
const MAX_DTMF_DURATION_MS: u64 = 6000;

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Audio engine settings
    pub audio: AudioConfig,
    /// Hold an established call when another call becomes primary
    pub auto_hold_background_calls: bool,
    /// Capture video when answering incoming calls
    pub answer_with_video: bool,
    /// Capture video when placing calls
    pub call_with_video: bool,
    /// Duration of DTMF tones sent through the session
    pub dtmf_duration_ms: u64,
    /// Logging setup for applications that let the client install it
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            auto_hold_background_calls: true,
            answer_with_video: false,
            call_with_video: false,
            dtmf_duration_ms: 100,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_auto_hold(mut self, enabled: bool) -> Self {
        self.auto_hold_background_calls = enabled;
        self
    }

    pub fn with_video(mut self, answer: bool, call: bool) -> Self {
        self.answer_with_video = answer;
        self.call_with_video = call;
        self
    }

    pub fn with_dtmf_duration_ms(mut self, duration_ms: u64) -> Self {
        self.dtmf_duration_ms = duration_ms;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn dtmf_duration(&self) -> Duration {
        Duration::from_millis(self.dtmf_duration_ms)
    }

    /// Load from an optional TOML file with `PHONEKIT_*` environment overrides
    ///
    /// Nested keys use a double underscore: `PHONEKIT_AUDIO__VOLUME_MAX=10`.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut loader = ConfigLoader::new().with_env_prefix(DEFAULT_ENV_PREFIX);
        if let Some(path) = path {
            loader = loader.with_file(path);
        }
        Ok(loader.load()?)
    }

    /// Parse a TOML document
    pub fn from_toml(document: &str) -> ClientResult<Self> {
        Ok(from_toml_str(document)?)
    }

    /// Validate the configuration
    pub fn check(&self) -> ClientResult<()> {
        self.audio.check()?;

        if self.dtmf_duration_ms == 0 || self.dtmf_duration_ms > MAX_DTMF_DURATION_MS {
            return Err(ClientError::invalid_configuration(
                "dtmf_duration_ms",
                format!("must be between 1 and {}", MAX_DTMF_DURATION_MS),
            ));
        }

        if parse_log_level(&self.logging.level).is_err() {
            return Err(ClientError::invalid_configuration(
                "logging.level",
                format!("unknown level {:?}", self.logging.level),
            ));
        }

        Ok(())
    }
}

impl SelfValidating for ClientConfig {
    fn validate(&self) -> InfraResult<()> {
        self.check()
            .map_err(|e| InfraError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.auto_hold_background_calls);
        assert!(!config.answer_with_video);
        assert_eq!(config.dtmf_duration(), Duration::from_millis(100));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_from_toml_nested_sections() {
        let config = ClientConfig::from_toml(
            r#"
            auto_hold_background_calls = false

            [audio]
            volume_max = 10.0

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert!(!config.auto_hold_background_calls);
        assert_eq!(config.audio.volume_max, 10.0);
        assert_eq!(config.audio.ring_on_secs, 2.0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = ClientConfig::from_toml("dtmf_duration_ms = 0");
        assert!(matches!(result, Err(ClientError::InvalidConfiguration { .. })));

        let result = ClientConfig::from_toml("[audio]\nvolume_max = -1.0");
        assert!(result.is_err());

        let bad_level = ClientConfig::default().with_logging(LoggingConfig {
            level: "loud".into(),
            ..Default::default()
        });
        assert!(bad_level.check().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ClientConfig::load(None).unwrap();
        assert_eq!(config.dtmf_duration_ms, ClientConfig::default().dtmf_duration_ms);
    }
}
