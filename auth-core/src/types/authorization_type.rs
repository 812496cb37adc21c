#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationType {
    #[serde(rename = "OCPP")]
    Ocpp,
    #[serde(rename = "RFID")]
    Rfid,
    Autocharge,
    PlugAndCharge,
    BankCard,
}
