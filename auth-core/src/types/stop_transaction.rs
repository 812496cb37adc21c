use super::IdToken;

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopTransactionReason {
    Local,
    MasterPass,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct StopTransactionRequest {
    pub reason: StopTransactionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<IdToken>,
}

impl StopTransactionRequest {
    pub fn new(reason: StopTransactionReason, id_token: Option<IdToken>) -> Self {
        Self { reason, id_token }
    }
}
