//! Call information structures
//!
//! Plain data describing calls, shared by the call state machine, the
//! registry and the public API. The live state machine is in
//! [`call_session`](crate::call_session).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a call
///
/// Generated once when the call is created and stable for its whole life,
/// independent of the signaling session behind it.
pub type CallId = Uuid;

/// Current state of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// No signaling session yet (outgoing call acquiring media)
    Idle,
    /// Outgoing call sent, not yet confirmed
    Originating,
    /// Incoming call waiting to be answered
    Ringing,
    /// Call is confirmed and media is flowing
    Established,
    /// Session ended or failed; tracks stopped
    Terminated,
}

impl CallState {
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Established)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, CallState::Terminated)
    }

    /// Not yet established and not terminated
    pub fn is_in_progress(&self) -> bool {
        matches!(self, CallState::Idle | CallState::Originating | CallState::Ringing)
    }
}

/// Direction of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    /// We placed the call
    Originating,
    /// The remote party called us
    Terminating,
}

impl Default for CallDirection {
    fn default() -> Self {
        CallDirection::Originating
    }
}

/// Which side put the call on hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoldState {
    pub local: bool,
    pub remote: bool,
}

impl HoldState {
    pub fn any(&self) -> bool {
        self.local || self.remote
    }
}

/// Which local media is muted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MuteState {
    pub audio: bool,
    pub video: bool,
}

/// Snapshot of a call for UI queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallInfo {
    pub call_id: CallId,
    pub state: CallState,
    pub direction: CallDirection,
    /// Exactly one call in the registry is primary
    pub primary: bool,
    pub in_transfer: bool,
    pub hold: HoldState,
    pub mute: MuteState,
    /// Local party identity (our user)
    pub local_identity: Option<String>,
    /// Remote party identity
    pub remote_identity: Option<String>,
    pub local_track_count: usize,
    pub remote_track_count: usize,
    pub created_at: DateTime<Utc>,
    pub established_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Aggregate call counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClientStats {
    /// Calls created since the client started
    pub total_calls: u64,
    /// Calls currently in the registry
    pub active_calls: usize,
    pub established_calls: usize,
    /// Incoming calls not yet answered
    pub ringing_calls: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(CallState::Established.is_active());
        assert!(CallState::Ringing.is_in_progress());
        assert!(CallState::Terminated.is_terminated());
        assert!(!CallState::Terminated.is_in_progress());
        assert_eq!(CallDirection::default(), CallDirection::Originating);
    }
}
