use std::time::Instant;

use evauth_core::types::{
    ProvidedToken, ReservationEndReason, StopTransactionRequest, TokenValidationStatus,
    ValidationOutcome,
};

use crate::{drivers::timers::TimerId, handler::core::AuthCore};

/// Collaborator calls decided under the lock, run once it is released.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AuthActions {
    NotifyEvse {
        evse_id: usize,
        token: ProvidedToken,
        outcome: ValidationOutcome,
    },
    WithdrawAuthorization(usize),
    StopTransaction {
        evse_id: usize,
        request: StopTransactionRequest,
    },
    PublishStatus {
        token: ProvidedToken,
        status: TokenValidationStatus,
    },
    /// `reservation_id` is `None` for an EVSE held back by global
    /// reservations in general.
    Reserved {
        evse_id: Option<usize>,
        reservation_id: Option<i32>,
    },
    ReservationCancelled {
        evse_id: Option<usize>,
        reservation_id: Option<i32>,
        reason: ReservationEndReason,
        send_reservation_update: bool,
    },
}

impl AuthCore {
    pub fn notify_evse(&mut self, evse_id: usize, token: ProvidedToken, outcome: ValidationOutcome) {
        self.queued_actions.push_back(AuthActions::NotifyEvse {
            evse_id,
            token,
            outcome,
        });
    }

    pub fn withdraw_evse_authorization(&mut self, evse_id: usize) {
        self.queued_actions
            .push_back(AuthActions::WithdrawAuthorization(evse_id));
    }

    pub fn stop_transaction(&mut self, evse_id: usize, request: StopTransactionRequest) {
        self.queued_actions
            .push_back(AuthActions::StopTransaction { evse_id, request });
    }

    pub fn publish_status(&mut self, token: ProvidedToken, status: TokenValidationStatus) {
        self.queued_actions
            .push_back(AuthActions::PublishStatus { token, status });
    }

    pub fn reserved(&mut self, evse_id: Option<usize>, reservation_id: Option<i32>) {
        self.queued_actions.push_back(AuthActions::Reserved {
            evse_id,
            reservation_id,
        });
    }

    pub fn reservation_cancelled(
        &mut self,
        evse_id: Option<usize>,
        reservation_id: Option<i32>,
        reason: ReservationEndReason,
        send_reservation_update: bool,
    ) {
        self.queued_actions
            .push_back(AuthActions::ReservationCancelled {
                evse_id,
                reservation_id,
                reason,
                send_reservation_update,
            });
    }

    pub fn add_timeout(&mut self, timer_id: TimerId, deadline: Instant) {
        self.timers.add_or_update(timer_id, deadline);
    }

    pub fn remove_timeout(&mut self, timer_id: TimerId) {
        self.timers.remove(timer_id);
    }
}
