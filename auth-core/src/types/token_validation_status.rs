#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenValidationStatus {
    Processing,
    Accepted,
    Rejected,
    TimedOut,
    UsedToStart,
    UsedToStop,
    Withdrawn,
}
