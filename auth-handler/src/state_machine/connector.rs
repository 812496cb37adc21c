use std::{
    collections::{BTreeMap, BTreeSet},
    time::Instant,
};

use evauth_core::types::{Connector, ConnectorType};

use crate::{drivers::timers::TimerId, handler::core::AuthCore};

#[derive(Clone, Debug)]
pub(crate) struct EvseState {
    pub connectors: Vec<Connector>,
    /// An EV is connected and no authorization has claimed the plug-in yet.
    pub plugged: bool,
    pub plug_in_expires_at: Option<Instant>,
    pub enabled: bool,
    pub faulted_connectors: BTreeSet<i32>,
}

impl EvseState {
    pub fn new(connectors: Vec<Connector>) -> Self {
        Self {
            connectors,
            plugged: false,
            plug_in_expires_at: None,
            enabled: true,
            faulted_connectors: BTreeSet::new(),
        }
    }

    pub fn plug_in(&mut self, expires_at: Instant) {
        self.plugged = true;
        self.plug_in_expires_at = Some(expires_at);
    }

    /// Returns whether there was a plug-in to consume.
    pub fn consume_plug_in(&mut self) -> bool {
        self.plug_in_expires_at = None;
        std::mem::replace(&mut self.plugged, false)
    }

    pub fn connector(&self, connector_id: i32) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == connector_id)
    }

    pub fn healthy_connectors(&self) -> impl Iterator<Item = &Connector> + '_ {
        self.connectors
            .iter()
            .filter(|c| !self.faulted_connectors.contains(&c.id))
    }

    pub fn has_healthy_connector_type(&self, connector_type: ConnectorType) -> bool {
        self.healthy_connectors()
            .any(|c| c.connector_type == connector_type)
    }

    /// Every connector carries a permanent fault.
    pub fn is_faulted(&self) -> bool {
        self.healthy_connectors().next().is_none()
    }

    pub fn is_available(&self) -> bool {
        self.enabled && !self.is_faulted()
    }
}

#[derive(Default, Debug)]
pub(crate) struct ConnectorTable {
    evses: BTreeMap<usize, EvseState>,
}

impl ConnectorTable {
    pub fn init_evse(&mut self, evse_id: usize, connectors: Vec<Connector>) -> bool {
        self.evses
            .insert(evse_id, EvseState::new(connectors))
            .is_some()
    }

    pub fn contains(&self, evse_id: usize) -> bool {
        self.evses.contains_key(&evse_id)
    }

    pub fn get(&self, evse_id: usize) -> Option<&EvseState> {
        self.evses.get(&evse_id)
    }

    pub fn get_mut(&mut self, evse_id: usize) -> Option<&mut EvseState> {
        self.evses.get_mut(&evse_id)
    }

    pub fn evse_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.evses.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &EvseState)> + '_ {
        self.evses.iter().map(|(id, state)| (*id, state))
    }

    /// Returns `Some(true)` when the EVSE just became fully faulted, `None`
    /// when the EVSE or connector is unknown.
    pub fn raise_fault(&mut self, evse_id: usize, connector_id: i32) -> Option<bool> {
        let state = self.evses.get_mut(&evse_id)?;
        state.connector(connector_id)?;
        let was_faulted = state.is_faulted();
        state.faulted_connectors.insert(connector_id);
        Some(!was_faulted && state.is_faulted())
    }

    pub fn clear_fault(&mut self, evse_id: usize, connector_id: i32) -> bool {
        self.evses
            .get_mut(&evse_id)
            .is_some_and(|state| state.faulted_connectors.remove(&connector_id))
    }
}

impl AuthCore {
    pub(crate) fn init_evse_helper(&mut self, evse_id: usize, connectors: Vec<Connector>) {
        if evse_id == 0 {
            log::warn!("evse ids start at 1, ignoring evse#0");
            return;
        }
        log::info!(
            "init evse#{} with {} connector(s)",
            evse_id,
            connectors.len()
        );
        if self.connectors.init_evse(evse_id, connectors) {
            log::warn!("evse#{} was already known, connector state reset", evse_id);
        }
        self.registry.register(evse_id);
    }

    /// The plug-in on `evse_id` was used up by an authorization or a
    /// transaction; the next token needs a fresh one.
    pub(crate) fn consume_plug_in(&mut self, evse_id: usize) {
        let consumed = self
            .connectors
            .get_mut(evse_id)
            .is_some_and(|state| state.consume_plug_in());
        if consumed {
            log::debug!("evse#{} plug-in consumed", evse_id);
            self.remove_timeout(TimerId::PlugIn(evse_id));
        }
    }

    pub(crate) fn plug_in_timeout_helper(&mut self, evse_id: usize, now: Instant) {
        let Some(state) = self.connectors.get_mut(evse_id) else {
            return;
        };
        match state.plug_in_expires_at {
            Some(expires_at) if expires_at > now => {
                self.add_timeout(TimerId::PlugIn(evse_id), expires_at);
            }
            Some(_) => {
                if state.consume_plug_in() {
                    log::info!(
                        "no token for the plug-in on evse#{} in time, replug required",
                        evse_id
                    );
                    self.withdraw_evse_authorization(evse_id);
                }
            }
            None => {}
        }
    }

    pub(crate) fn permanent_fault_raised_helper(&mut self, evse_id: usize, connector_id: i32) {
        if self.configs.ignore_connector_faults.value {
            log::debug!(
                "ignoring fault on evse#{} connector {}",
                evse_id,
                connector_id
            );
            return;
        }
        match self.connectors.raise_fault(evse_id, connector_id) {
            None => log::warn!(
                "fault raised for unknown evse#{} connector {}",
                evse_id,
                connector_id
            ),
            Some(true) => {
                log::info!("evse#{} is faulted", evse_id);
                self.drop_candidate(evse_id);
            }
            Some(false) => {}
        }
    }

    pub(crate) fn permanent_fault_cleared_helper(&mut self, evse_id: usize, connector_id: i32) {
        if self.configs.ignore_connector_faults.value {
            return;
        }
        if self.connectors.clear_fault(evse_id, connector_id) {
            log::info!(
                "fault cleared on evse#{} connector {}",
                evse_id,
                connector_id
            );
        }
    }
}
