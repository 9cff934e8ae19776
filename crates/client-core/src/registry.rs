//! Ordered collection of live calls with exactly one primary
//!
//! The registry keeps calls in insertion order. Whenever it is non-empty
//! exactly one call is primary; every mutation moves the primary flag inside
//! the same critical section, so the invariant holds between any two
//! operations.

use tracing::{debug, info};

use crate::call::CallId;
use crate::call_session::{Call, CallContext};
use crate::events::ClientEvent;

/// Live calls, in the order they were added
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: Vec<Call>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Call> {
        self.calls.iter()
    }

    pub fn ids(&self) -> Vec<CallId> {
        self.calls.iter().map(|c| c.id()).collect()
    }

    pub fn contains(&self, call_id: CallId) -> bool {
        self.calls.iter().any(|c| c.id() == call_id)
    }

    pub fn get(&self, call_id: CallId) -> Option<&Call> {
        self.calls.iter().find(|c| c.id() == call_id)
    }

    pub fn get_mut(&mut self, call_id: CallId) -> Option<&mut Call> {
        self.calls.iter_mut().find(|c| c.id() == call_id)
    }

    /// Call bound to the signaling session `session_id`
    pub fn find_by_session(&self, session_id: &str) -> Option<CallId> {
        self.calls
            .iter()
            .find(|c| c.session_id().as_deref() == Some(session_id))
            .map(|c| c.id())
    }

    pub fn primary(&self) -> Option<&Call> {
        self.calls.iter().find(|c| c.is_primary())
    }

    pub fn primary_mut(&mut self) -> Option<&mut Call> {
        self.calls.iter_mut().find(|c| c.is_primary())
    }

    pub fn primary_id(&self) -> Option<CallId> {
        self.primary().map(|c| c.id())
    }

    /// Append `call` and make it primary, demoting the current primary
    pub fn add_call(&mut self, mut call: Call, cx: &mut CallContext<'_>) -> CallId {
        let call_id = call.id();
        if let Some(current) = self.primary_mut() {
            current.demote(cx);
        }

        info!("Call {} added ({:?})", call_id, call.direction());
        cx.emit(ClientEvent::CallAdded {
            call_id,
            direction: call.direction(),
        });

        call.promote(cx);
        self.calls.push(call);
        call_id
    }

    /// Make `call_id` primary. Returns false for an unknown call or the
    /// current primary.
    pub fn switch_call(&mut self, call_id: CallId, cx: &mut CallContext<'_>) -> bool {
        if !self.contains(call_id) || self.primary_id() == Some(call_id) {
            debug!("Switch to call {} ignored", call_id);
            return false;
        }

        if let Some(current) = self.primary_mut() {
            current.demote(cx);
        }
        if let Some(call) = self.get_mut(call_id) {
            call.promote(cx);
        }
        true
    }

    /// Remove and tear down `call_id`.
    ///
    /// When the primary call leaves, the first remaining call with a live
    /// session is promoted, or else the first remaining call.
    pub fn remove_call(&mut self, call_id: CallId, cx: &mut CallContext<'_>) -> Option<Call> {
        let index = self.calls.iter().position(|c| c.id() == call_id)?;
        let mut call = self.calls.remove(index);

        let was_primary = call.is_primary();
        call.release_primary(cx);
        call.teardown(cx);

        info!("Call {} removed", call_id);
        cx.emit(ClientEvent::CallRemoved { call_id });

        if was_primary {
            let replacement = self
                .calls
                .iter()
                .position(|c| c.has_live_session())
                .or_else(|| (!self.calls.is_empty()).then_some(0));
            if let Some(index) = replacement {
                self.calls[index].promote(cx);
            }
        }

        Some(call)
    }

    /// Remove and tear down every call without promoting a replacement
    pub fn clear(&mut self, cx: &mut CallContext<'_>) -> Vec<Call> {
        let mut calls = std::mem::take(&mut self.calls);
        for call in &mut calls {
            call.release_primary(cx);
        }
        for call in &mut calls {
            call.teardown(cx);
            cx.emit(ClientEvent::CallRemoved { call_id: call.id() });
        }
        info!("Removed all {} calls", calls.len());
        calls
    }
}
