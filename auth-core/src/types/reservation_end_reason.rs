#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationEndReason {
    Expired,
    Cancelled,
    UsedToStartCharging,
    GlobalReservationRequirementDropped,
}
