use evauth_core::types::{
    ProvidedToken, ReservationEndReason, StopTransactionRequest, TokenValidationStatus,
    ValidationOutcome,
};

/// Collaborators of the handler.
///
/// `validate_token` is called without any internal lock held and may be
/// slow. Every other method is called after the handler's lock has been
/// released, so implementations may call back into the handler.
pub trait AuthInterface: Send + Sync + 'static {
    /// Ask the validation backends about a token. The last accepted entry wins;
    /// an empty list counts as a rejection.
    fn validate_token(&self, token: &ProvidedToken) -> Vec<ValidationOutcome>;

    fn notify_evse(&self, evse_id: usize, token: &ProvidedToken, outcome: &ValidationOutcome);

    /// A granted authorization that never became a transaction was revoked.
    fn withdraw_authorization(&self, evse_id: usize);

    fn stop_transaction(&self, evse_id: usize, request: &StopTransactionRequest);

    fn publish_token_validation_status(&self, token: &ProvidedToken, status: TokenValidationStatus);

    /// An EVSE got reserved. A `None` reservation id means the EVSE is held
    /// back for global reservations; a `None` EVSE means a global
    /// reservation was accepted.
    fn reserved(&self, evse_id: Option<usize>, reservation_id: Option<i32>);

    /// A reservation ended. With a `None` reservation id an EVSE held back
    /// for global reservations became available again.
    fn reservation_cancelled(
        &self,
        evse_id: Option<usize>,
        reservation_id: Option<i32>,
        reason: ReservationEndReason,
        send_reservation_update: bool,
    );
}
