use super::ProvidedToken;

/// Notifications from the EVSE manager about the physical session.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The EV got plugged in.
    SessionStarted,
    /// A transaction started for `token`, which may differ from the one
    /// authorized (remote start, local authorization list).
    TransactionStarted { token: ProvidedToken },
    TransactionFinished,
    /// The EV got unplugged.
    SessionFinished,
    Deauthorized,
    Disabled,
    Enabled,
}
