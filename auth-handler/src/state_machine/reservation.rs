use std::{
    collections::{BTreeMap, BTreeSet},
    time::Instant,
};

use chrono::{DateTime, Utc};
use evauth_core::types::{
    ConnectorType, IdToken, Reservation, ReservationCheckStatus, ReservationEndReason,
    ReservationResult, ReservationScope,
};

use crate::{drivers::timers::TimerId, handler::core::AuthCore};

use super::{auth::TokenRef, connector::ConnectorTable, transaction::TransactionRegistry};

#[derive(Default, Debug)]
pub(crate) struct ReservationTable {
    reservations: BTreeMap<i32, Reservation>,
    /// EVSEs last reported as held back for global reservations.
    reserved_evses: BTreeSet<usize>,
}

impl ReservationTable {
    /// Stores `reservation`, replacing one with the same id.
    pub fn insert(&mut self, reservation: Reservation) -> Option<Reservation> {
        self.reservations
            .insert(reservation.reservation_id, reservation)
    }

    pub fn remove(&mut self, reservation_id: i32) -> Option<Reservation> {
        self.reservations.remove(&reservation_id)
    }

    pub fn get(&self, reservation_id: i32) -> Option<&Reservation> {
        self.reservations.get(&reservation_id)
    }

    fn on_evse(&self, evse_id: usize) -> impl Iterator<Item = &Reservation> + '_ {
        self.reservations
            .values()
            .filter(move |r| r.scope == ReservationScope::Evse(evse_id))
    }

    fn global(&self, connector_type: ConnectorType) -> impl Iterator<Item = &Reservation> + '_ {
        self.reservations
            .values()
            .filter(move |r| r.scope == ReservationScope::Global(connector_type))
    }

    /// EVSEs other than `excluded` that could still serve a global
    /// reservation of `connector_type` right now.
    fn spare_evses(
        &self,
        connector_type: ConnectorType,
        excluded: usize,
        connectors: &ConnectorTable,
        registry: &TransactionRegistry,
    ) -> usize {
        connectors
            .iter()
            .filter(|(evse_id, state)| {
                *evse_id != excluded
                    && state.is_available()
                    && state.has_healthy_connector_type(connector_type)
                    && registry.is_free(*evse_id)
                    && self.on_evse(*evse_id).next().is_none()
            })
            .count()
    }

    pub fn is_usable(
        &self,
        evse_id: usize,
        connector_id: i32,
        holder: TokenRef<'_>,
        connectors: &ConnectorTable,
        registry: &TransactionRegistry,
    ) -> bool {
        let Some(connector) = connectors
            .get(evse_id)
            .and_then(|state| state.connector(connector_id))
        else {
            return false;
        };

        let mut reserved_here = self.on_evse(evse_id).peekable();
        if reserved_here.peek().is_some() {
            return reserved_here.any(|r| holder.holds(r));
        }

        let competing = self
            .global(connector.connector_type)
            .filter(|r| !holder.holds(r))
            .count();
        competing == 0
            || self.spare_evses(connector.connector_type, evse_id, connectors, registry) >= competing
    }

    /// An EVSE is usable when it has a healthy connector and none of its
    /// healthy connectors is held back by a reservation.
    pub fn is_evse_usable(
        &self,
        evse_id: usize,
        holder: TokenRef<'_>,
        connectors: &ConnectorTable,
        registry: &TransactionRegistry,
    ) -> bool {
        let Some(state) = connectors.get(evse_id) else {
            return false;
        };
        let mut healthy = state.healthy_connectors().peekable();
        healthy.peek().is_some()
            && healthy.all(|c| self.is_usable(evse_id, c.id, holder, connectors, registry))
    }

    /// Free EVSEs that global reservations currently hold back: all of them
    /// once there are as many global reservations as free EVSEs, otherwise
    /// those of a connector type with no spare EVSE left.
    pub fn global_reserved_evses(
        &self,
        connectors: &ConnectorTable,
        registry: &TransactionRegistry,
    ) -> BTreeSet<usize> {
        let available: BTreeSet<usize> = connectors
            .iter()
            .filter(|(evse_id, state)| {
                state.is_available()
                    && registry.is_free(*evse_id)
                    && self.on_evse(*evse_id).next().is_none()
            })
            .map(|(evse_id, _)| evse_id)
            .collect();
        let global_types: Vec<ConnectorType> = self
            .reservations
            .values()
            .filter_map(|r| match r.scope {
                ReservationScope::Global(ty) => Some(ty),
                ReservationScope::Evse(_) => None,
            })
            .collect();
        if available.len() == global_types.len() {
            return available;
        }

        let with_type = |ty: ConnectorType| {
            available.iter().copied().filter(move |evse_id| {
                connectors
                    .get(*evse_id)
                    .is_some_and(|state| state.has_healthy_connector_type(ty))
            })
        };
        let mut reserved = BTreeSet::new();
        for &ty in &global_types {
            let wanted = global_types.iter().filter(|other| **other == ty).count();
            if wanted >= with_type(ty).count() {
                reserved.extend(with_type(ty));
            }
        }
        reserved
    }

    /// Records the new held-back set and returns the EVSEs that became
    /// reserved and those that were released.
    pub fn update_reserved_evses(
        &mut self,
        reserved: BTreeSet<usize>,
        connectors: &ConnectorTable,
        registry: &TransactionRegistry,
    ) -> (Vec<usize>, Vec<usize>) {
        let newly: Vec<usize> = reserved.difference(&self.reserved_evses).copied().collect();
        let released: Vec<usize> = self
            .reserved_evses
            .difference(&reserved)
            .copied()
            .filter(|evse_id| {
                connectors
                    .get(*evse_id)
                    .is_some_and(|state| state.is_available())
                    && registry.is_free(*evse_id)
            })
            .collect();
        self.reserved_evses = reserved;
        (newly, released)
    }

    pub fn is_evse_reserved(&self, evse_id: usize) -> bool {
        self.on_evse(evse_id).next().is_some() || self.reserved_evses.contains(&evse_id)
    }

    /// Reservation held by `holder` on `evse_id`. A per-EVSE reservation
    /// decides on its own; otherwise, and without an EVSE, global ones are
    /// searched.
    pub fn held_reservation(&self, evse_id: Option<usize>, holder: TokenRef<'_>) -> Option<i32> {
        if let Some(evse_id) = evse_id {
            let mut reserved_here = self.on_evse(evse_id).peekable();
            if reserved_here.peek().is_some() {
                return reserved_here
                    .find(|r| holder.holds(r))
                    .map(|r| r.reservation_id);
            }
        }
        self.reservations
            .values()
            .find(|r| matches!(r.scope, ReservationScope::Global(_)) && holder.holds(r))
            .map(|r| r.reservation_id)
    }

    /// Whether the reservation blocking `evse_id` names a parent, so the
    /// presented token may still turn out to belong to its group.
    pub fn has_reservation_parent(&self, evse_id: usize) -> bool {
        let mut reserved_here = self.on_evse(evse_id).peekable();
        if reserved_here.peek().is_some() {
            return reserved_here.any(|r| r.parent_id_token.is_some());
        }
        self.reservations.values().any(|r| {
            matches!(r.scope, ReservationScope::Global(_)) && r.parent_id_token.is_some()
        })
    }

    /// Reservation `holder` consumes by starting on `evse_id`.
    pub fn matching_reservation(
        &self,
        evse_id: usize,
        holder: TokenRef<'_>,
        connectors: &ConnectorTable,
    ) -> Option<i32> {
        if let Some(r) = self.on_evse(evse_id).find(|r| holder.holds(r)) {
            return Some(r.reservation_id);
        }
        let state = connectors.get(evse_id)?;
        self.reservations
            .values()
            .find(|r| match r.scope {
                ReservationScope::Global(ty) => {
                    state.has_healthy_connector_type(ty) && holder.holds(r)
                }
                ReservationScope::Evse(_) => false,
            })
            .map(|r| r.reservation_id)
    }
}

fn instant_at(expiry_time: DateTime<Utc>, now_utc: DateTime<Utc>, now: Instant) -> Instant {
    now + (expiry_time - now_utc).to_std().unwrap_or_default()
}

impl AuthCore {
    pub(crate) fn make_reservation_helper(
        &mut self,
        reservation: Reservation,
        now_utc: DateTime<Utc>,
        now: Instant,
    ) -> ReservationResult {
        if reservation.expiry_time <= now_utc {
            log::info!(
                "reservation {} rejected, expiry {} is not in the future",
                reservation.reservation_id,
                reservation.expiry_time
            );
            return ReservationResult::Rejected;
        }
        if let Some(evse_id) = reservation.scope.evse_id() {
            if !self.connectors.contains(evse_id) {
                log::warn!(
                    "reservation {} rejected, unknown evse#{}",
                    reservation.reservation_id,
                    evse_id
                );
                return ReservationResult::Rejected;
            }
        }

        let reservation_id = reservation.reservation_id;
        let evse_id = reservation.scope.evse_id();
        let deadline = instant_at(reservation.expiry_time, now_utc, now);
        log::info!(
            "reservation {} accepted for {:?} until {}",
            reservation_id,
            reservation.scope,
            reservation.expiry_time
        );
        if self.reservations.insert(reservation).is_some() {
            log::info!("reservation {} replaced", reservation_id);
        }
        self.add_timeout(TimerId::Reservation(reservation_id), deadline);
        self.reserved(evse_id, Some(reservation_id));
        ReservationResult::Accepted
    }

    pub(crate) fn reservation_exists_helper(
        &self,
        id_token: &IdToken,
        evse_id: Option<usize>,
        group_id_token: Option<&IdToken>,
    ) -> ReservationCheckStatus {
        let holder = TokenRef::new(id_token, group_id_token);
        let held = self.reservations.held_reservation(evse_id, holder);
        let Some(evse_id) = evse_id else {
            return match held {
                Some(_) => ReservationCheckStatus::ReservedForToken,
                None => ReservationCheckStatus::NotReserved,
            };
        };
        if !self.reservations.is_evse_reserved(evse_id) {
            ReservationCheckStatus::NotReserved
        } else if held.is_some() {
            ReservationCheckStatus::ReservedForToken
        } else if group_id_token.is_none() && self.reservations.has_reservation_parent(evse_id) {
            ReservationCheckStatus::ReservedForOtherTokenAndHasParentToken
        } else {
            ReservationCheckStatus::ReservedForOtherToken
        }
    }

    /// Reports EVSEs that global reservations started or stopped holding
    /// back since the last call.
    pub(crate) fn check_reserved_evses_helper(&mut self) {
        let reserved = self
            .reservations
            .global_reserved_evses(&self.connectors, &self.registry);
        let (newly, released) =
            self.reservations
                .update_reserved_evses(reserved, &self.connectors, &self.registry);
        for evse_id in newly {
            log::debug!("evse#{} is now reserved", evse_id);
            self.reserved(Some(evse_id), None);
        }
        for evse_id in released {
            log::debug!("evse#{} is available again", evse_id);
            self.reservation_cancelled(
                Some(evse_id),
                None,
                ReservationEndReason::GlobalReservationRequirementDropped,
                false,
            );
        }
    }

    pub(crate) fn cancel_reservation_helper(&mut self, reservation_id: i32) -> Option<ReservationScope> {
        let Some(reservation) = self.reservations.remove(reservation_id) else {
            log::debug!("no reservation {} to cancel", reservation_id);
            return None;
        };
        self.remove_timeout(TimerId::Reservation(reservation_id));
        log::info!("reservation {} cancelled", reservation_id);
        self.reservation_cancelled(
            reservation.scope.evse_id(),
            Some(reservation_id),
            ReservationEndReason::Cancelled,
            false,
        );
        Some(reservation.scope)
    }

    pub(crate) fn reservation_timeout_helper(
        &mut self,
        reservation_id: i32,
        now_utc: DateTime<Utc>,
        now: Instant,
    ) {
        let Some(expiry_time) = self.reservations.get(reservation_id).map(|r| r.expiry_time) else {
            return;
        };
        if expiry_time > now_utc {
            self.add_timeout(
                TimerId::Reservation(reservation_id),
                instant_at(expiry_time, now_utc, now),
            );
            return;
        }
        if let Some(reservation) = self.reservations.remove(reservation_id) {
            log::info!("reservation {} expired", reservation_id);
            self.reservation_cancelled(
                reservation.scope.evse_id(),
                Some(reservation_id),
                ReservationEndReason::Expired,
                true,
            );
        }
    }
}
