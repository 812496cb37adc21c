#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationResult {
    Accepted,
    Faulted,
    Occupied,
    Rejected,
    Unavailable,
}
