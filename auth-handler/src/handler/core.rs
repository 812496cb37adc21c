use std::{
    collections::{HashMap, VecDeque},
    time::Instant,
};

use chrono::{DateTime, Utc};
use evauth_core::types::IdToken;

use crate::{
    drivers::timers::{TimerDriver, TimerId},
    state_machine::{
        actions::AuthActions, connector::ConnectorTable, request::PendingRequest,
        reservation::ReservationTable, transaction::TransactionRegistry,
    },
};

use super::config::AuthConfigs;

/// Everything guarded by the handler lock.
pub(crate) struct AuthCore {
    pub connectors: ConnectorTable,
    pub reservations: ReservationTable,
    pub registry: TransactionRegistry,
    pub requests: HashMap<IdToken, PendingRequest>,
    pub next_ticket: u64,
    pub configs: AuthConfigs,
    pub timers: TimerDriver,
    pub queued_actions: VecDeque<AuthActions>,
}

impl AuthCore {
    pub fn new(configs: AuthConfigs, timers: TimerDriver) -> Self {
        Self {
            connectors: ConnectorTable::default(),
            reservations: ReservationTable::default(),
            registry: TransactionRegistry::default(),
            requests: HashMap::new(),
            next_ticket: 0,
            configs,
            timers,
            queued_actions: VecDeque::new(),
        }
    }

    pub fn drain_actions(&mut self) -> Vec<AuthActions> {
        self.queued_actions.drain(..).collect()
    }

    pub fn handle_timeout_helper(&mut self, id: TimerId, now_utc: DateTime<Utc>, now: Instant) {
        match id {
            TimerId::Authorization(evse_id) => self.authorization_timeout_helper(evse_id, now),
            TimerId::PlugIn(evse_id) => self.plug_in_timeout_helper(evse_id, now),
            TimerId::Reservation(reservation_id) => {
                self.reservation_timeout_helper(reservation_id, now_utc, now)
            }
        }
    }
}
