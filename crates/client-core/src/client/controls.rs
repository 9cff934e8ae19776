// Call control operations for the client-core library
//
// Every control acts on the primary call. With no primary call the control
// does nothing and returns Ok.

use tracing::{debug, info};

use crate::call::{CallId, CallState};
use crate::call_session::{Call, CallContext};
use crate::error::ClientResult;
use crate::events::ClientEvent;

impl super::manager::ClientManager {
    /// Run `control` on the primary call. Errors are also published as
    /// `client.error`.
    fn with_primary<F>(&self, name: &str, control: F) -> ClientResult<()>
    where
        F: FnOnce(&mut Call, &mut CallContext<'_>) -> ClientResult<()>,
    {
        let result = self.with_registry(|registry, cx| {
            let Some(call) = registry.primary_mut() else {
                debug!("{} ignored: no primary call", name);
                return Ok(None);
            };
            let call_id = call.id();
            control(call, cx).map(|_| Some(call_id)).map_err(|e| (call_id, e))
        });

        match result {
            Ok(_) => Ok(()),
            Err((call_id, e)) => {
                self.publish_error(Some(call_id), &e);
                Err(e)
            }
        }
    }

    // ===== CALL LIFECYCLE =====

    /// Abandon the primary call if it is not established yet.
    ///
    /// A call still waiting for local media is removed outright.
    pub fn cancel(&self) -> ClientResult<()> {
        let removed_idle = self.with_registry(|registry, cx| {
            let call_id = registry.primary().filter(|c| c.state() == CallState::Idle).map(Call::id)?;
            registry.remove_call(call_id, cx)?;
            cx.emit(ClientEvent::CallEnded {
                call_id,
                cause: "Canceled".to_string(),
            });
            info!("Call {} canceled before dialing", call_id);
            Some(call_id)
        });
        if removed_idle.is_some() {
            return Ok(());
        }
        self.with_primary("cancel", |call, _| call.cancel())
    }

    pub fn hangup(&self) -> ClientResult<()> {
        self.with_primary("hangup", |call, _| call.hangup())
    }

    // ===== HOLD / MUTE =====

    pub fn hold(&self) -> ClientResult<()> {
        self.with_primary("hold", |call, _| call.hold())
    }

    pub fn unhold(&self) -> ClientResult<()> {
        self.with_primary("unhold", |call, _| call.unhold())
    }

    pub fn toggle_hold(&self) -> ClientResult<()> {
        self.with_primary("toggle_hold", |call, _| call.toggle_hold())
    }

    pub fn mute(&self) -> ClientResult<()> {
        self.with_primary("mute", |call, _| call.mute())
    }

    pub fn unmute(&self) -> ClientResult<()> {
        self.with_primary("unmute", |call, _| call.unmute())
    }

    pub fn toggle_mute(&self) -> ClientResult<()> {
        self.with_primary("toggle_mute", |call, _| call.toggle_mute())
    }

    // ===== TRANSFER / DTMF =====

    /// Blind-transfer the primary call; see [`Call::transfer`]
    pub fn transfer(&self, target: Option<&str>) -> ClientResult<()> {
        self.with_primary("transfer", |call, cx| call.transfer(target, cx))
    }

    /// Send DTMF on the primary call, or extend its transfer target
    pub fn send_dtmf(&self, digits: &str) -> ClientResult<()> {
        self.with_primary("send_dtmf", |call, cx| call.send_dtmf(digits, cx))
    }

    // ===== PRIMARY =====

    /// Make `call_id` the primary call. Returns false if nothing changed.
    pub fn switch_call(&self, call_id: CallId) -> bool {
        self.with_registry(|registry, cx| registry.switch_call(call_id, cx))
    }
}
