//! Events published by the client
//!
//! Every state change of a call or of the registry becomes a [`ClientEvent`]
//! on the client's [`EventBus`](phonekit_infra_common::events::EventBus).
//! Topics are dot-namespaced (`call.primary.promoted`,
//! `call.ringing.started`, `client.error`) so consumers can subscribe to a
//! whole namespace with a prefix.
//!
//! Events produced while the registry is being mutated are collected and
//! published once the mutation is complete. Observers never see two primary
//! calls, or none while calls exist.

use std::collections::HashSet;

use phonekit_infra_common::events::{Event, EventPriority, Topic, topic_matches};

use crate::call::{CallDirection, CallId, HoldState, MuteState};
use crate::session::Originator;

/// Client state changes
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A call entered the registry
    CallAdded { call_id: CallId, direction: CallDirection },
    /// A call left the registry
    CallRemoved { call_id: CallId },
    /// The call became the primary (audible) call
    PrimaryPromoted { call_id: CallId },
    /// The call stopped being the primary call
    PrimaryDemoted { call_id: CallId },
    RingingStarted { call_id: CallId },
    RingingStopped { call_id: CallId },
    /// Provisional progress on an unconfirmed call
    CallProgress { call_id: CallId },
    CallEstablished { call_id: CallId },
    HoldChanged {
        call_id: CallId,
        originator: Originator,
        hold: HoldState,
    },
    MuteChanged { call_id: CallId, mute: MuteState },
    DtmfReceived {
        call_id: CallId,
        originator: Originator,
        tone: String,
    },
    InfoReceived {
        call_id: CallId,
        content_type: String,
        body: String,
    },
    /// The remote party asked us to call someone else
    ReferReceived { call_id: CallId, target: String },
    /// Transfer target collection started
    TransferStarted { call_id: CallId },
    /// A digit was appended to the transfer target
    TransferTargetUpdated { call_id: CallId, target: String },
    TransferSucceeded { call_id: CallId, target: String },
    TransferFailed { call_id: CallId, reason: String },
    /// Track reconciliation changed the call's track sets
    TracksChanged {
        call_id: CallId,
        local_added: usize,
        local_removed: usize,
        remote_added: usize,
        remote_removed: usize,
    },
    CallEnded { call_id: CallId, cause: String },
    CallFailed { call_id: CallId, cause: String },
    /// A failure outside a direct caller's reach (signaling callback, timer)
    Error {
        call_id: Option<CallId>,
        category: &'static str,
        message: String,
    },
}

impl ClientEvent {
    /// Get the call ID associated with this event (if any)
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            ClientEvent::CallAdded { call_id, .. }
            | ClientEvent::CallRemoved { call_id }
            | ClientEvent::PrimaryPromoted { call_id }
            | ClientEvent::PrimaryDemoted { call_id }
            | ClientEvent::RingingStarted { call_id }
            | ClientEvent::RingingStopped { call_id }
            | ClientEvent::CallProgress { call_id }
            | ClientEvent::CallEstablished { call_id }
            | ClientEvent::HoldChanged { call_id, .. }
            | ClientEvent::MuteChanged { call_id, .. }
            | ClientEvent::DtmfReceived { call_id, .. }
            | ClientEvent::InfoReceived { call_id, .. }
            | ClientEvent::ReferReceived { call_id, .. }
            | ClientEvent::TransferStarted { call_id }
            | ClientEvent::TransferTargetUpdated { call_id, .. }
            | ClientEvent::TransferSucceeded { call_id, .. }
            | ClientEvent::TransferFailed { call_id, .. }
            | ClientEvent::TracksChanged { call_id, .. }
            | ClientEvent::CallEnded { call_id, .. }
            | ClientEvent::CallFailed { call_id, .. } => Some(*call_id),
            ClientEvent::Error { call_id, .. } => *call_id,
        }
    }

    /// Check if this event passes the given filter
    pub fn passes_filter(&self, filter: &EventFilter) -> bool {
        filter.matches(self)
    }
}

impl Event for ClientEvent {
    fn topic(&self) -> Topic {
        match self {
            ClientEvent::CallAdded { .. } => "call.added",
            ClientEvent::CallRemoved { .. } => "call.removed",
            ClientEvent::PrimaryPromoted { .. } => "call.primary.promoted",
            ClientEvent::PrimaryDemoted { .. } => "call.primary.demoted",
            ClientEvent::RingingStarted { .. } => "call.ringing.started",
            ClientEvent::RingingStopped { .. } => "call.ringing.stopped",
            ClientEvent::CallProgress { .. } => "call.progress",
            ClientEvent::CallEstablished { .. } => "call.established",
            ClientEvent::HoldChanged { .. } => "call.hold",
            ClientEvent::MuteChanged { .. } => "call.mute",
            ClientEvent::DtmfReceived { .. } => "call.dtmf",
            ClientEvent::InfoReceived { .. } => "call.info",
            ClientEvent::ReferReceived { .. } => "call.refer",
            ClientEvent::TransferStarted { .. } => "call.transfer.started",
            ClientEvent::TransferTargetUpdated { .. } => "call.transfer.target",
            ClientEvent::TransferSucceeded { .. } => "call.transfer.succeeded",
            ClientEvent::TransferFailed { .. } => "call.transfer.failed",
            ClientEvent::TracksChanged { .. } => "call.tracks",
            ClientEvent::CallEnded { .. } => "call.ended",
            ClientEvent::CallFailed { .. } => "call.failed",
            ClientEvent::Error { .. } => "client.error",
        }
    }

    fn priority(&self) -> EventPriority {
        match self {
            ClientEvent::CallFailed { .. } | ClientEvent::Error { .. } => EventPriority::Critical,
            ClientEvent::RingingStarted { .. }
            | ClientEvent::PrimaryPromoted { .. }
            | ClientEvent::CallEnded { .. }
            | ClientEvent::TransferFailed { .. } => EventPriority::High,
            ClientEvent::TracksChanged { .. } | ClientEvent::CallProgress { .. } => EventPriority::Low,
            _ => EventPriority::Normal,
        }
    }
}

/// Event filtering options for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only receive events whose topic lives under one of these prefixes
    pub topics: Option<Vec<String>>,
    /// Only receive events for specific calls
    pub call_ids: Option<HashSet<CallId>>,
    /// Minimum event priority level
    pub min_priority: Option<EventPriority>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, prefix: impl Into<String>) -> Self {
        self.topics.get_or_insert_with(Vec::new).push(prefix.into());
        self
    }

    pub fn with_call(mut self, call_id: CallId) -> Self {
        self.call_ids.get_or_insert_with(HashSet::new).insert(call_id);
        self
    }

    pub fn with_min_priority(mut self, priority: EventPriority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn matches(&self, event: &ClientEvent) -> bool {
        if let Some(min_priority) = self.min_priority {
            if event.priority() < min_priority {
                return false;
            }
        }

        if let Some(call_ids) = &self.call_ids {
            match event.call_id() {
                Some(call_id) if call_ids.contains(&call_id) => {}
                // Events without a call id only pass unfiltered
                _ => return false,
            }
        }

        if let Some(topics) = &self.topics {
            if !topics.iter().any(|prefix| topic_matches(prefix, event.topic())) {
                return false;
            }
        }

        true
    }
}
