use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use evauth_core::types::{
    Connector, IdToken, ProvidedToken, Reservation, ReservationCheckStatus, ReservationResult,
    ReservationScope, SessionEvent, TokenHandlingResult, TokenValidationStatus,
    ValidationOutcome, WithdrawAuthorizationRequest, WithdrawAuthorizationResult,
};
use flume::Receiver;

use crate::{
    drivers::timers::{self, TimerId},
    interfaces::{AuthInterface, Clock, SystemClock},
    state_machine::{
        actions::AuthActions,
        auth::{select_outcome, TokenAdmission, TokenDecision, Validation},
    },
};

use self::{config::{AuthConfigs, AuthHandlerConfig}, core::AuthCore, error::Error};

pub(crate) mod config;
pub(crate) mod core;
pub(crate) mod error;

struct Shared<I, C> {
    core: Mutex<AuthCore>,
    interface: I,
    clock: C,
}

/// Thread-safe entry point. Cloning yields another handle to the same
/// station state.
pub struct AuthHandler<I: AuthInterface, C: Clock = SystemClock> {
    shared: Arc<Shared<I, C>>,
}

impl<I: AuthInterface, C: Clock> Clone for AuthHandler<I, C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<I: AuthInterface> AuthHandler<I> {
    pub fn new(interface: I, config: AuthHandlerConfig) -> Result<Self, Error> {
        Self::with_clock(interface, SystemClock, config)
    }
}

impl<I: AuthInterface, C: Clock> AuthHandler<I, C> {
    pub fn with_clock(interface: I, clock: C, config: AuthHandlerConfig) -> Result<Self, Error> {
        let configs = AuthConfigs::build(config.auth_configs)?;
        log::info!(
            "auth handler starting, selection algorithm: {}, connection timeout: {}s",
            configs.selection_algorithm.raw,
            configs.connection_time_out.value
        );
        let (timers, timer_thread) = timers::channel();
        let shared = Arc::new(Shared {
            core: Mutex::new(AuthCore::new(configs, timers)),
            interface,
            clock,
        });

        let weak = Arc::downgrade(&shared);
        timer_thread
            .spawn(move |id| match weak.upgrade() {
                Some(shared) => {
                    AuthHandler { shared }.handle_timeout(id);
                    true
                }
                None => false,
            })
            .map_err(Error::TimerThread)?;

        Ok(Self { shared })
    }

    pub fn init_evse(&self, evse_id: usize, connectors: Vec<Connector>) {
        self.with_core(|core| core.init_evse_helper(evse_id, connectors));
    }

    /// Presents a token and blocks until it started or stopped a
    /// transaction, got turned away, or gave up waiting for a plug-in.
    pub fn on_token(&self, mut token: ProvidedToken) -> TokenHandlingResult {
        log::info!(
            "received {:?} token {}",
            token.authorization_type,
            token.id_token.redacted()
        );
        self.publish(&token, TokenValidationStatus::Processing);

        let (waker, waiter) = flume::bounded(1);
        let admission =
            self.with_core(|core| core.begin_token_helper(&token, waker, Instant::now()));
        let master_pass = match admission {
            TokenAdmission::AlreadyInProcess => return TokenHandlingResult::AlreadyInProcess,
            TokenAdmission::Admitted { master_pass } => master_pass,
        };

        let result = self.process_token(&mut token, master_pass, &waiter);

        if let Some(status) = result.validation_status() {
            self.publish(&token, status);
        }
        self.with_core(|core| core.finish_token_helper(&token.id_token, result));
        result
    }

    fn process_token(
        &self,
        token: &mut ProvidedToken,
        master_pass: bool,
        waiter: &Receiver<TokenHandlingResult>,
    ) -> TokenHandlingResult {
        if master_pass {
            log::info!("master pass group id cannot start a transaction");
            return TokenHandlingResult::Rejected;
        }
        let outcome = match self.validate(token) {
            Validation::Accepted(outcome) => outcome,
            Validation::Rejected(outcome) => {
                if let Some(outcome) = outcome {
                    let token = &*token;
                    self.with_core(|core| core.reject_token_helper(token, &outcome));
                }
                return TokenHandlingResult::Rejected;
            }
        };
        if let Some(parent_id_token) = &outcome.parent_id_token {
            token.parent_id_token = Some(parent_id_token.clone());
        }
        self.publish(token, TokenValidationStatus::Accepted);

        let token = &*token;
        match self.with_core(|core| core.decide_token_helper(token, &outcome, Instant::now())) {
            TokenDecision::Done(result) => result,
            TokenDecision::Wait(deadline) => match waiter.recv_deadline(deadline) {
                Ok(result) => result,
                Err(_) => self.with_core(|core| core.expire_request_helper(&token.id_token)),
            },
        }
    }

    fn validate(&self, token: &ProvidedToken) -> Validation {
        if token.is_prevalidated() {
            log::debug!("{} is prevalidated", token.id_token.redacted());
            return Validation::Accepted(ValidationOutcome::accepted());
        }
        let outcomes = panic::catch_unwind(AssertUnwindSafe(|| {
            self.shared.interface.validate_token(token)
        }))
        .unwrap_or_else(|_| {
            log::error!("validation of {} panicked", token.id_token.redacted());
            Vec::new()
        });
        let validation = select_outcome(outcomes, self.shared.clock.now());
        if let Validation::Rejected(_) = validation {
            log::info!("{} was not accepted", token.id_token.redacted());
        }
        validation
    }

    pub fn handle_session_event(&self, evse_id: usize, event: SessionEvent) {
        self.with_core(|core| core.session_event_helper(evse_id, event, Instant::now()));
    }

    pub fn handle_reservation(&self, reservation: Reservation) -> ReservationResult {
        let now_utc = self.shared.clock.now();
        self.with_core(|core| core.make_reservation_helper(reservation, now_utc, Instant::now()))
    }

    /// Returns the scope the cancelled reservation covered, `None` if it
    /// did not exist.
    pub fn handle_cancel_reservation(&self, reservation_id: i32) -> Option<ReservationScope> {
        self.with_core(|core| core.cancel_reservation_helper(reservation_id))
    }

    /// Whether `id_token`, or its group, may use `evse_id` as far as
    /// reservations go. Without an EVSE, only whether it holds any global
    /// reservation.
    pub fn handle_reservation_exists(
        &self,
        id_token: &IdToken,
        evse_id: Option<usize>,
        group_id_token: Option<&IdToken>,
    ) -> ReservationCheckStatus {
        self.with_core(|core| core.reservation_exists_helper(id_token, evse_id, group_id_token))
    }

    /// Applies a later validation result, such as a parent id learned after
    /// the transaction started, to the token authorized on `evse_id`.
    pub fn handle_token_validation_result_update(&self, evse_id: usize, outcome: ValidationOutcome) {
        self.with_core(|core| core.validation_result_update_helper(evse_id, &outcome));
    }

    pub fn handle_withdraw_authorization(
        &self,
        request: WithdrawAuthorizationRequest,
    ) -> WithdrawAuthorizationResult {
        self.with_core(|core| core.withdraw_authorization_helper(&request))
    }

    pub fn handle_permanent_fault_raised(&self, evse_id: usize, connector_id: i32) {
        self.with_core(|core| core.permanent_fault_raised_helper(evse_id, connector_id));
    }

    pub fn handle_permanent_fault_cleared(&self, evse_id: usize, connector_id: i32) {
        self.with_core(|core| core.permanent_fault_cleared_helper(evse_id, connector_id));
    }

    /// Seconds a granted or waiting token has to see its transaction start.
    pub fn set_connection_timeout(&self, connection_timeout: u64) {
        self.with_core(|core| core.configs.connection_time_out.update(connection_timeout));
    }

    pub fn set_master_pass_group_id(&self, master_pass_group_id: Option<IdToken>) {
        self.with_core(|core| core.configs.master_pass_group_id.update(master_pass_group_id));
    }

    pub fn set_prioritize_authorization_over_stopping_transaction(&self, prioritize: bool) {
        self.with_core(|core| {
            core.configs
                .prioritize_authorization_over_stopping_transaction
                .update(prioritize)
        });
    }

    /// Current configuration as key/value pairs, in the form
    /// [`AuthHandlerConfig`] accepts.
    pub fn configuration(&self) -> Vec<(String, String)> {
        self.with_core(|core| core.configs.entries())
    }

    fn handle_timeout(&self, id: TimerId) {
        let now_utc = self.shared.clock.now();
        self.with_core(|core| core.handle_timeout_helper(id, now_utc, Instant::now()));
    }

    fn lock(&self) -> MutexGuard<'_, AuthCore> {
        self.shared
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the lock, then performs the collaborator calls it
    /// queued with the lock released.
    fn with_core<T>(&self, f: impl FnOnce(&mut AuthCore) -> T) -> T {
        let (value, actions) = {
            let mut core = self.lock();
            let value = f(&mut core);
            core.check_reserved_evses_helper();
            (value, core.drain_actions())
        };
        self.run_actions(actions);
        value
    }

    fn publish(&self, token: &ProvidedToken, status: TokenValidationStatus) {
        log::debug!("{} status {:?}", token.id_token.redacted(), status);
        self.shared
            .interface
            .publish_token_validation_status(token, status);
    }

    fn run_actions(&self, actions: Vec<AuthActions>) {
        let interface = &self.shared.interface;
        for action in actions {
            match action {
                AuthActions::NotifyEvse {
                    evse_id,
                    token,
                    outcome,
                } => {
                    log::debug!("notify evse#{}", evse_id);
                    interface.notify_evse(evse_id, &token, &outcome);
                }
                AuthActions::WithdrawAuthorization(evse_id) => {
                    log::debug!("withdraw authorization, evse#{}", evse_id);
                    interface.withdraw_authorization(evse_id);
                }
                AuthActions::StopTransaction { evse_id, request } => {
                    log::debug!("stop transaction, evse#{}, reason: {:?}", evse_id, request.reason);
                    interface.stop_transaction(evse_id, &request);
                }
                AuthActions::PublishStatus { token, status } => self.publish(&token, status),
                AuthActions::Reserved {
                    evse_id,
                    reservation_id,
                } => {
                    log::debug!("reserved, evse: {:?}, reservation: {:?}", evse_id, reservation_id);
                    interface.reserved(evse_id, reservation_id);
                }
                AuthActions::ReservationCancelled {
                    evse_id,
                    reservation_id,
                    reason,
                    send_reservation_update,
                } => {
                    log::debug!(
                        "reservation {:?} ended, evse: {:?}, reason: {:?}",
                        reservation_id,
                        evse_id,
                        reason
                    );
                    interface.reservation_cancelled(
                        evse_id,
                        reservation_id,
                        reason,
                        send_reservation_update,
                    );
                }
            }
        }
    }
}
