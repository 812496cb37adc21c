use super::IdToken;

/// Revokes a granted or pending authorization. Either field narrows the
/// match; with neither set every authorization matches.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WithdrawAuthorizationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evse_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<IdToken>,
}

impl WithdrawAuthorizationRequest {
    pub fn for_evse(evse_id: usize) -> Self {
        Self {
            evse_id: Some(evse_id),
            id_token: None,
        }
    }
    pub fn for_token(id_token: impl Into<IdToken>) -> Self {
        Self {
            evse_id: None,
            id_token: Some(id_token.into()),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawAuthorizationResult {
    Accepted,
    AuthorizationNotFound,
    EvseNotFound,
}
