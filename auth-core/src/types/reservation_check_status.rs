/// Whether a token may use an EVSE, as far as reservations are concerned.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationCheckStatus {
    NotReserved,
    ReservedForToken,
    ReservedForOtherToken,
    /// Reserved for someone else whose group may still use it; the caller
    /// should retry once it knows the presented token's group.
    ReservedForOtherTokenAndHasParentToken,
}
