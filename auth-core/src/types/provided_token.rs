use super::{AuthorizationType, IdToken};

/// A token as it was presented at the station, before validation.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct ProvidedToken {
    pub id_token: IdToken,
    pub authorization_type: AuthorizationType,
    /// EVSE ids the token may be used on; `None` means all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectors: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevalidated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id_token: Option<IdToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl ProvidedToken {
    pub fn new(id_token: impl Into<IdToken>, authorization_type: AuthorizationType) -> Self {
        Self {
            id_token: id_token.into(),
            authorization_type,
            connectors: None,
            prevalidated: None,
            parent_id_token: None,
            certificate: None,
        }
    }
    pub fn rfid(id_token: impl Into<IdToken>) -> Self {
        Self::new(id_token, AuthorizationType::Rfid)
    }
    pub fn with_connectors(mut self, connectors: Vec<usize>) -> Self {
        self.connectors = Some(connectors);
        self
    }
    pub fn with_parent(mut self, parent_id_token: impl Into<IdToken>) -> Self {
        self.parent_id_token = Some(parent_id_token.into());
        self
    }
    pub fn with_prevalidated(mut self, prevalidated: bool) -> Self {
        self.prevalidated = Some(prevalidated);
        self
    }
    pub fn is_prevalidated(&self) -> bool {
        self.prevalidated.unwrap_or(false)
    }
}
