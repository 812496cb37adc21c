use std::{
    collections::{BTreeMap, BTreeSet},
    time::Instant,
};

use evauth_core::types::{
    IdToken, ProvidedToken, ReservationEndReason, TokenValidationStatus, ValidationOutcome,
};

use crate::{drivers::timers::TimerId, handler::core::AuthCore};

use super::auth::TokenRef;

/// Authorization state of one EVSE.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum AuthSlot {
    Empty,
    /// Handed to the EVSE; withdrawn again if no transaction starts before
    /// `expires_at`.
    Granted {
        token: ProvidedToken,
        expires_at: Instant,
    },
    /// A transaction is running for `token`.
    Active { token: ProvidedToken },
}

#[derive(Default, Debug)]
pub(crate) struct TransactionRegistry {
    slots: BTreeMap<usize, AuthSlot>,
}

impl TransactionRegistry {
    pub fn register(&mut self, evse_id: usize) {
        self.slots.insert(evse_id, AuthSlot::Empty);
    }

    pub fn slot(&self, evse_id: usize) -> Option<&AuthSlot> {
        self.slots.get(&evse_id)
    }

    pub fn is_free(&self, evse_id: usize) -> bool {
        matches!(self.slots.get(&evse_id), Some(AuthSlot::Empty))
    }

    pub fn grant(&mut self, evse_id: usize, token: ProvidedToken, expires_at: Instant) -> bool {
        match self.slots.get_mut(&evse_id) {
            Some(slot) if matches!(slot, AuthSlot::Empty) => {
                *slot = AuthSlot::Granted { token, expires_at };
                true
            }
            _ => false,
        }
    }

    /// Marks the transaction on `evse_id` as running. A granted slot only
    /// activates for the token it was granted to and keeps what validation
    /// learned about it.
    pub fn activate(&mut self, evse_id: usize, started: &ProvidedToken) -> bool {
        let Some(slot) = self.slots.get_mut(&evse_id) else {
            return false;
        };
        let token = match slot {
            AuthSlot::Empty => started.clone(),
            AuthSlot::Granted { token, .. } if token.id_token == started.id_token => {
                let mut token = token.clone();
                if token.parent_id_token.is_none() {
                    token.parent_id_token = started.parent_id_token.clone();
                }
                token
            }
            AuthSlot::Granted { .. } | AuthSlot::Active { .. } => return false,
        };
        *slot = AuthSlot::Active { token };
        true
    }

    /// The token bound to `evse_id`, granted or running.
    pub fn token_mut(&mut self, evse_id: usize) -> Option<&mut ProvidedToken> {
        match self.slots.get_mut(&evse_id)? {
            AuthSlot::Granted { token, .. } | AuthSlot::Active { token } => Some(token),
            AuthSlot::Empty => None,
        }
    }

    pub fn clear(&mut self, evse_id: usize) -> Option<AuthSlot> {
        self.slots
            .get_mut(&evse_id)
            .map(|slot| std::mem::replace(slot, AuthSlot::Empty))
    }

    pub fn clear_granted(&mut self, evse_id: usize) -> Option<ProvidedToken> {
        let slot = self.slots.get_mut(&evse_id)?;
        if !matches!(slot, AuthSlot::Granted { .. }) {
            return None;
        }
        match std::mem::replace(slot, AuthSlot::Empty) {
            AuthSlot::Granted { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn granted_evse(&self, id_token: &IdToken) -> Option<usize> {
        self.slots.iter().find_map(|(evse_id, slot)| match slot {
            AuthSlot::Granted { token, .. } if token.id_token == *id_token => Some(*evse_id),
            _ => None,
        })
    }

    pub fn granted_evses(&self) -> impl Iterator<Item = (usize, &ProvidedToken)> + '_ {
        self.slots.iter().filter_map(|(evse_id, slot)| match slot {
            AuthSlot::Granted { token, .. } => Some((*evse_id, token)),
            _ => None,
        })
    }

    /// First EVSE among `candidates` running a transaction that `holder`
    /// is entitled to stop. Without `by_own_id` only the holder's parent
    /// counts.
    pub fn stop_candidate(
        &self,
        candidates: &BTreeSet<usize>,
        holder: TokenRef<'_>,
        by_own_id: bool,
    ) -> Option<usize> {
        candidates.iter().copied().find(|evse_id| match self.slots.get(evse_id) {
            Some(AuthSlot::Active { token }) if by_own_id => {
                holder.is_related(&token.id_token, token.parent_id_token.as_ref())
            }
            Some(AuthSlot::Active { token }) => holder
                .parent_id_token
                .is_some_and(|parent| TokenRef::of(token).is_related(parent, None)),
            _ => false,
        })
    }

    pub fn active_among(&self, candidates: &BTreeSet<usize>) -> Vec<usize> {
        candidates
            .iter()
            .copied()
            .filter(|evse_id| matches!(self.slots.get(evse_id), Some(AuthSlot::Active { .. })))
            .collect()
    }
}

impl AuthCore {
    /// Binds `token` to `evse_id`, consumes a reservation the token holds
    /// there and notifies the EVSE. The slot must be free.
    pub(crate) fn grant_evse(
        &mut self,
        evse_id: usize,
        token: &ProvidedToken,
        outcome: &ValidationOutcome,
        now: Instant,
    ) -> bool {
        let expires_at = self.configs.connection_deadline(now);
        let mut granted = token.clone();
        granted.connectors = Some(vec![evse_id]);
        if !self.registry.grant(evse_id, granted.clone(), expires_at) {
            log::warn!("evse#{} is not free, cannot grant", evse_id);
            return false;
        }
        self.add_timeout(TimerId::Authorization(evse_id), expires_at);
        self.consume_plug_in(evse_id);

        let mut outcome = outcome.clone();
        let holder = TokenRef::of(token);
        if let Some(reservation_id) =
            self.reservations
                .matching_reservation(evse_id, holder, &self.connectors)
        {
            if let Some(reservation) = self.reservations.remove(reservation_id) {
                log::info!(
                    "reservation {} used on evse#{}",
                    reservation.reservation_id,
                    evse_id
                );
                self.remove_timeout(TimerId::Reservation(reservation_id));
                self.reservation_cancelled(
                    Some(evse_id),
                    Some(reservation_id),
                    ReservationEndReason::UsedToStartCharging,
                    true,
                );
                outcome.reservation_id = Some(reservation_id);
            }
        }

        log::info!("authorized evse#{} for {}", evse_id, token.id_token.redacted());
        self.notify_evse(evse_id, granted, outcome);
        true
    }

    pub(crate) fn authorization_timeout_helper(&mut self, evse_id: usize, now: Instant) {
        match self.registry.slot(evse_id) {
            Some(AuthSlot::Granted { expires_at, .. }) if *expires_at > now => {
                let expires_at = *expires_at;
                self.add_timeout(TimerId::Authorization(evse_id), expires_at);
                return;
            }
            Some(AuthSlot::Granted { .. }) => {}
            _ => return,
        }
        if let Some(token) = self.registry.clear_granted(evse_id) {
            log::info!(
                "authorization on evse#{} expired before a transaction started",
                evse_id
            );
            self.withdraw_evse_authorization(evse_id);
            self.publish_status(token, TokenValidationStatus::TimedOut);
        }
    }

    /// A later validation of the token bound to `evse_id` replaces its
    /// parent id; stopping by group uses it from now on.
    pub(crate) fn validation_result_update_helper(
        &mut self,
        evse_id: usize,
        outcome: &ValidationOutcome,
    ) {
        let Some(token) = self.registry.token_mut(evse_id) else {
            log::warn!(
                "validation update for evse#{} which has no authorization",
                evse_id
            );
            return;
        };
        token.parent_id_token = outcome.parent_id_token.clone();
        let mut token = token.clone();
        token.connectors = Some(vec![evse_id]);
        log::info!(
            "validation of {} on evse#{} updated",
            token.id_token.redacted(),
            evse_id
        );
        self.publish_status(token, TokenValidationStatus::Accepted);
    }
}
