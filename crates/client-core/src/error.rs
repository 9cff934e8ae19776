//! Error types for client-core operations
//!
//! Errors fall into a few categories that suggest how a caller should react:
//!
//! - **signaling** - the signaling collaborator rejected a request. The error
//!   is passed through unmodified; the core never retries.
//! - **media** - local media could not be acquired, or the audio engine
//!   refused an operation. No call or track state is left behind.
//! - **call** - the referenced call does not exist (any more).
//! - **configuration** - invalid settings; fix the configuration and retry.
//!
//! "Act on the current call" operations with nothing to act on are not
//! errors: they return `Ok(())` without doing anything.
//!
//! ```rust,no_run
//! # use phonekit_client_core::{ClientManager, ClientError};
//! # async fn example(client: ClientManager) {
//! match client.make_call("sip:bob@example.com").await {
//!     Ok(call_id) => println!("Calling, call {}", call_id),
//!     Err(ClientError::MediaAcquisition { reason }) => {
//!         eprintln!("Microphone unavailable: {}", reason);
//!     }
//!     Err(e) => eprintln!("Call failed ({}): {}", e.category(), e),
//! }
//! # }
//! ```

use thiserror::Error;

use phonekit_audio_core::AudioError;

use crate::call::CallId;
use crate::session::SignalingError;

/// Result type alias for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client-core errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The signaling collaborator rejected a request
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Local media could not be acquired
    #[error("Media acquisition failed: {reason}")]
    MediaAcquisition { reason: String },

    #[error("Call not found: {call_id}")]
    CallNotFound { call_id: CallId },

    /// Digits outside 0-9, A-D, * and #
    #[error("Invalid DTMF digits: {digits:?}")]
    InvalidDtmf { digits: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// The audio engine refused an operation
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ClientError {
    pub fn media_acquisition(reason: impl Into<String>) -> Self {
        Self::MediaAcquisition { reason: reason.into() }
    }

    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A device may be plugged in or permission granted later
            ClientError::MediaAcquisition { .. } => true,
            ClientError::Signaling(e) => e.is_temporary(),

            ClientError::InvalidConfiguration { .. } |
            ClientError::InvalidDtmf { .. } |
            ClientError::CallNotFound { .. } => false,

            _ => false,
        }
    }

    /// Check if error is call-related
    pub fn is_call_error(&self) -> bool {
        matches!(self, ClientError::CallNotFound { .. })
    }

    /// Get error category for logging and event payloads
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Signaling(_) => "signaling",

            ClientError::MediaAcquisition { .. } |
            ClientError::Audio(_) |
            ClientError::InvalidDtmf { .. } => "media",

            ClientError::CallNotFound { .. } => "call",

            ClientError::InvalidConfiguration { .. } => "configuration",

            ClientError::InternalError { .. } => "system",
        }
    }
}

impl From<phonekit_infra_common::Error> for ClientError {
    fn from(err: phonekit_infra_common::Error) -> Self {
        match err {
            phonekit_infra_common::Error::Validation(reason) => {
                ClientError::invalid_configuration("config", reason)
            }
            phonekit_infra_common::Error::Config(reason) => {
                ClientError::invalid_configuration("source", reason)
            }
            other => ClientError::internal_error(other.to_string()),
        }
    }
}
