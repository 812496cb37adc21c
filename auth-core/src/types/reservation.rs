use chrono::{DateTime, Utc};

use super::{ConnectorType, IdToken};

/// What a reservation holds on to: one EVSE, or any one connector of a type
/// anywhere in the station.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationScope {
    Evse(usize),
    Global(ConnectorType),
}

impl ReservationScope {
    pub fn evse_id(&self) -> Option<usize> {
        match self {
            ReservationScope::Evse(evse_id) => Some(*evse_id),
            ReservationScope::Global(_) => None,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct Reservation {
    pub reservation_id: i32,
    pub id_token: IdToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id_token: Option<IdToken>,
    pub scope: ReservationScope,
    pub expiry_time: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        reservation_id: i32,
        id_token: impl Into<IdToken>,
        scope: ReservationScope,
        expiry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            reservation_id,
            id_token: id_token.into(),
            parent_id_token: None,
            scope,
            expiry_time,
        }
    }
    pub fn with_parent(mut self, parent_id_token: impl Into<IdToken>) -> Self {
        self.parent_id_token = Some(parent_id_token.into());
        self
    }
    /// True if `id_token` or `parent_id_token` of a presented token equals
    /// this reservation's token or parent token.
    pub fn is_held_by(&self, id_token: &IdToken, parent_id_token: Option<&IdToken>) -> bool {
        let holders = [Some(&self.id_token), self.parent_id_token.as_ref()];
        let presented = [Some(id_token), parent_id_token];
        holders
            .iter()
            .flatten()
            .any(|held| presented.iter().flatten().any(|p| *p == *held))
    }
}
