use std::time::Instant;

use evauth_core::types::SessionEvent;

use crate::{drivers::timers::TimerId, handler::core::AuthCore};

use super::transaction::AuthSlot;

impl AuthCore {
    pub(crate) fn session_event_helper(&mut self, evse_id: usize, event: SessionEvent, now: Instant) {
        let plug_in_deadline = self.configs.connection_deadline(now);
        let Some(state) = self.connectors.get_mut(evse_id) else {
            log::warn!("session event {:?} for unknown evse#{}", event, evse_id);
            return;
        };
        log::debug!("evse#{} session event {:?}", evse_id, event);

        match event {
            SessionEvent::SessionStarted => {
                state.plug_in(plug_in_deadline);
                self.add_timeout(TimerId::PlugIn(evse_id), plug_in_deadline);
                self.grant_waiter(evse_id, now);
            }
            SessionEvent::TransactionStarted { token } => {
                self.consume_plug_in(evse_id);
                if self.registry.activate(evse_id, &token) {
                    self.remove_timeout(TimerId::Authorization(evse_id));
                } else {
                    log::warn!(
                        "transaction on evse#{} does not match its authorization",
                        evse_id
                    );
                }
            }
            SessionEvent::TransactionFinished | SessionEvent::SessionFinished => {
                self.consume_plug_in(evse_id);
                self.clear_slot(evse_id);
            }
            SessionEvent::Deauthorized => {
                if self.registry.clear_granted(evse_id).is_some() {
                    log::info!("evse#{} deauthorized", evse_id);
                    self.remove_timeout(TimerId::Authorization(evse_id));
                }
            }
            SessionEvent::Disabled => {
                state.enabled = false;
                self.drop_candidate(evse_id);
            }
            SessionEvent::Enabled => {
                state.enabled = true;
            }
        }
    }

    fn clear_slot(&mut self, evse_id: usize) {
        match self.registry.clear(evse_id) {
            Some(AuthSlot::Granted { .. }) => self.remove_timeout(TimerId::Authorization(evse_id)),
            Some(AuthSlot::Active { .. }) => log::info!("transaction on evse#{} finished", evse_id),
            _ => {}
        }
    }
}
