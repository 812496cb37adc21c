mod authorization_status;
mod authorization_type;
mod connector;
mod id_token;
mod provided_token;
mod reservation;
mod reservation_check_status;
mod reservation_end_reason;
mod reservation_result;
mod selection_algorithm;
mod session_event;
mod stop_transaction;
mod token_handling_result;
mod token_validation_status;
mod validation_outcome;
mod withdraw_authorization;

pub use authorization_status::AuthorizationStatus;
pub use authorization_type::AuthorizationType;
pub use connector::{Connector, ConnectorType};
pub use id_token::IdToken;
pub use provided_token::ProvidedToken;
pub use reservation::{Reservation, ReservationScope};
pub use reservation_check_status::ReservationCheckStatus;
pub use reservation_end_reason::ReservationEndReason;
pub use reservation_result::ReservationResult;
pub use selection_algorithm::SelectionAlgorithm;
pub use session_event::SessionEvent;
pub use stop_transaction::{StopTransactionReason, StopTransactionRequest};
pub use token_handling_result::TokenHandlingResult;
pub use token_validation_status::TokenValidationStatus;
pub use validation_outcome::ValidationOutcome;
pub use withdraw_authorization::{WithdrawAuthorizationRequest, WithdrawAuthorizationResult};
