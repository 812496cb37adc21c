#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectorType {
    #[serde(rename = "cCCS1")]
    Ccs1,
    #[serde(rename = "cCCS2")]
    Ccs2,
    #[serde(rename = "cG105")]
    Chademo,
    #[serde(rename = "cTesla")]
    Tesla,
    #[serde(rename = "cType1")]
    Type1,
    #[serde(rename = "cType2")]
    Type2,
    #[serde(rename = "sType2")]
    SocketType2,
    #[serde(rename = "sType3")]
    SocketType3,
    Pan,
    Other,
    Unknown,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Connector {
    pub id: i32,
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
}

impl Connector {
    pub fn new(id: i32, connector_type: ConnectorType) -> Self {
        Self { id, connector_type }
    }
}
