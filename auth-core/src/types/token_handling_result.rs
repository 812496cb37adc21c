use core::fmt;

use super::TokenValidationStatus;

/// Final answer to one token presentation.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenHandlingResult {
    AlreadyInProcess,
    Rejected,
    UsedToStartTransaction,
    UsedToStopTransaction,
    Timeout,
    NoConnectorAvailable,
    Withdrawn,
}

impl TokenHandlingResult {
    /// The status published when a token ends with this result. A duplicate
    /// presentation publishes nothing.
    pub fn validation_status(&self) -> Option<TokenValidationStatus> {
        match self {
            TokenHandlingResult::AlreadyInProcess => None,
            TokenHandlingResult::Rejected | TokenHandlingResult::NoConnectorAvailable => {
                Some(TokenValidationStatus::Rejected)
            }
            TokenHandlingResult::UsedToStartTransaction => Some(TokenValidationStatus::UsedToStart),
            TokenHandlingResult::UsedToStopTransaction => Some(TokenValidationStatus::UsedToStop),
            TokenHandlingResult::Timeout => Some(TokenValidationStatus::TimedOut),
            TokenHandlingResult::Withdrawn => Some(TokenValidationStatus::Withdrawn),
        }
    }
}

impl fmt::Display for TokenHandlingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenHandlingResult::AlreadyInProcess => "ALREADY_IN_PROCESS",
            TokenHandlingResult::Rejected => "REJECTED",
            TokenHandlingResult::UsedToStartTransaction => "USED_TO_START_TRANSACTION",
            TokenHandlingResult::UsedToStopTransaction => "USED_TO_STOP_TRANSACTION",
            TokenHandlingResult::Timeout => "TIMEOUT",
            TokenHandlingResult::NoConnectorAvailable => "NO_CONNECTOR_AVAILABLE",
            TokenHandlingResult::Withdrawn => "WITHDRAWN",
        };
        f.write_str(name)
    }
}
