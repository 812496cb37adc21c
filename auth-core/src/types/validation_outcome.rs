use chrono::{DateTime, Utc};

use super::{AuthorizationStatus, IdToken};

/// One validator's verdict about a token.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub authorization_status: AuthorizationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id_token: Option<IdToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evse_ids: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<i32>,
}

impl ValidationOutcome {
    pub fn new(authorization_status: AuthorizationStatus) -> Self {
        Self {
            authorization_status,
            parent_id_token: None,
            evse_ids: None,
            expiry_time: None,
            reservation_id: None,
        }
    }
    pub fn accepted() -> Self {
        Self::new(AuthorizationStatus::Accepted)
    }
    pub fn invalid() -> Self {
        Self::new(AuthorizationStatus::Invalid)
    }
    pub fn with_parent(mut self, parent_id_token: impl Into<IdToken>) -> Self {
        self.parent_id_token = Some(parent_id_token.into());
        self
    }
    pub fn with_evse_ids(mut self, evse_ids: Vec<usize>) -> Self {
        self.evse_ids = Some(evse_ids);
        self
    }
    pub fn with_expiry_time(mut self, expiry_time: DateTime<Utc>) -> Self {
        self.expiry_time = Some(expiry_time);
        self
    }
    /// Accepted and not past its expiry time.
    pub fn is_valid(&self, current_time: Option<DateTime<Utc>>) -> bool {
        if self.authorization_status != AuthorizationStatus::Accepted {
            return false;
        }
        match (self.expiry_time, current_time) {
            (Some(expiry_time), Some(now)) => now <= expiry_time,
            _ => true,
        }
    }
}
