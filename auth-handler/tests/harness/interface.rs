use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use evauth_handler::{
    types::{
        IdToken, ProvidedToken, ReservationEndReason, StopTransactionRequest,
        TokenValidationStatus, ValidationOutcome,
    },
    AuthInterface,
};
use flume::Sender;

use super::event::Event;

/// Validator answers shared between the test and the mock.
#[derive(Clone, Default)]
pub struct Validations {
    answers: Arc<Mutex<HashMap<IdToken, Vec<ValidationOutcome>>>>,
    delay: Arc<Mutex<Duration>>,
}

impl Validations {
    pub fn set(&self, id_token: &str, outcomes: Vec<ValidationOutcome>) {
        self.answers
            .lock()
            .unwrap()
            .insert(IdToken::new(id_token), outcomes);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    fn get(&self, id_token: &IdToken) -> Vec<ValidationOutcome> {
        self.answers
            .lock()
            .unwrap()
            .get(id_token)
            .cloned()
            .unwrap_or_else(|| vec![ValidationOutcome::invalid()])
    }
}

pub const PANICKING_TOKEN: &str = "PANIC";

pub struct MockInterface {
    bus: Sender<Event>,
    validations: Validations,
}

impl MockInterface {
    pub fn new(bus: Sender<Event>, validations: Validations) -> Self {
        Self { bus, validations }
    }

    fn push(&self, ev: Event) {
        // timers may outlive the test that armed them
        self.bus.send(ev).ok();
    }
}

impl AuthInterface for MockInterface {
    fn validate_token(&self, token: &ProvidedToken) -> Vec<ValidationOutcome> {
        let delay = *self.validations.delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.push(Event::Validated(token.id_token.clone()));
        if token.id_token.matches(PANICKING_TOKEN) {
            panic!("validation backend crashed");
        }
        self.validations.get(&token.id_token)
    }

    fn notify_evse(&self, evse_id: usize, token: &ProvidedToken, outcome: &ValidationOutcome) {
        self.push(Event::NotifyEvse {
            evse_id,
            id_token: token.id_token.clone(),
            status: outcome.authorization_status,
            reservation_id: outcome.reservation_id,
        });
    }

    fn withdraw_authorization(&self, evse_id: usize) {
        self.push(Event::WithdrawAuthorization(evse_id));
    }

    fn stop_transaction(&self, evse_id: usize, request: &StopTransactionRequest) {
        self.push(Event::StopTransaction {
            evse_id,
            reason: request.reason,
            id_token: request.id_token.clone(),
        });
    }

    fn publish_token_validation_status(&self, token: &ProvidedToken, status: TokenValidationStatus) {
        self.push(Event::Status {
            id_token: token.id_token.clone(),
            status,
        });
    }

    fn reserved(&self, evse_id: Option<usize>, reservation_id: Option<i32>) {
        self.push(Event::Reserved {
            evse_id,
            reservation_id,
        });
    }

    fn reservation_cancelled(
        &self,
        evse_id: Option<usize>,
        reservation_id: Option<i32>,
        reason: ReservationEndReason,
        send_reservation_update: bool,
    ) {
        self.push(Event::ReservationCancelled {
            evse_id,
            reservation_id,
            reason,
            send_reservation_update,
        });
    }
}
