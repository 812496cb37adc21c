use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

use evauth_core::types::{IdToken, SelectionAlgorithm};
use serde::{Deserialize, Serialize};

/// Construction-time configuration. Keys use the same names the station
/// configuration uses; unknown keys and unparsable values are rejected.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AuthHandlerConfig {
    pub auth_configs: Vec<(String, String)>,
}

impl AuthHandlerConfig {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.auth_configs.push((key.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownKey(String),
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownKey(key) => write!(f, "unknown configuration key {}", key),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value {:?} for configuration key {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub(crate) struct AuthConfig<T> {
    pub key: String,
    pub raw: String,
    pub value: T,
    pub parser_fn: fn(&str) -> Option<T>,
    pub format_fn: fn(&T) -> String,
}

impl<T> AuthConfig<T> {
    pub fn new(key: &str, value: T) -> Self {
        Self {
            key: key.to_string(),
            raw: String::new(),
            value,
            parser_fn: |_| None,
            format_fn: |_| String::new(),
        }
    }
    pub fn with_std(mut self) -> Self
    where
        T: ToString + FromStr,
    {
        self.parser_fn = |s| s.trim().parse().ok();
        self.format_fn = |v| v.to_string();
        self.raw = (self.format_fn)(&self.value);
        self
    }
    pub fn with_parse(mut self, parser_fn: fn(&str) -> Option<T>) -> Self {
        self.parser_fn = parser_fn;
        self
    }
    pub fn with_format_fn(mut self, format_fn: fn(&T) -> String) -> Self {
        self.format_fn = format_fn;
        self.raw = (self.format_fn)(&self.value);
        self
    }
    pub fn set_raw(&mut self, raw: String) -> Result<(), ConfigError> {
        match (self.parser_fn)(&raw) {
            Some(value) => {
                self.raw = raw;
                self.value = value;
                Ok(())
            }
            None => Err(ConfigError::InvalidValue {
                key: self.key.clone(),
                value: raw,
            }),
        }
    }
    pub fn update(&mut self, value: T) {
        self.raw = (self.format_fn)(&value);
        self.value = value;
    }
}

macro_rules! config_key_map {
    ($macro:ident, $this:ident, $key:expr $(, $args:tt)*) => {
        $macro!($this, $key, {
            "SelectionAlgorithm" => selection_algorithm,
            "ConnectionTimeOut" => connection_time_out,
            "PrioritizeAuthorizationOverStoppingTransaction" => prioritize_authorization_over_stopping_transaction,
            "MasterPassGroupId" => master_pass_group_id,
            "IgnoreConnectorFaults" => ignore_connector_faults
        } $(, $args)*)
    };
}

macro_rules! gen_update_match {
    ($this:ident, $key:expr, { $($key_str:literal => $field:ident),+ }, $raw:expr) => {
        match $key {
            $(
                $key_str => $this.$field.set_raw($raw),
            )+
            _ => Err(ConfigError::UnknownKey($key.to_string())),
        }
    };
}

macro_rules! gen_entries {
    ($this:ident, $key:expr, { $($key_str:literal => $field:ident),+ }) => {
        vec![$(($key_str.to_string(), $this.$field.raw.clone())),+]
    };
}

/// Longest connection timeout honoured, roughly a year.
const MAX_CONNECTION_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) struct AuthConfigs {
    pub selection_algorithm: AuthConfig<SelectionAlgorithm>,
    /// Seconds.
    pub connection_time_out: AuthConfig<u64>,
    pub prioritize_authorization_over_stopping_transaction: AuthConfig<bool>,
    pub master_pass_group_id: AuthConfig<Option<IdToken>>,
    pub ignore_connector_faults: AuthConfig<bool>,
}

impl AuthConfigs {
    fn new() -> Self {
        Self {
            selection_algorithm: AuthConfig::new("SelectionAlgorithm", SelectionAlgorithm::default())
                .with_parse(parse_selection_algorithm)
                .with_format_fn(format_selection_algorithm),
            connection_time_out: AuthConfig::new("ConnectionTimeOut", 10).with_std(),
            prioritize_authorization_over_stopping_transaction: AuthConfig::new(
                "PrioritizeAuthorizationOverStoppingTransaction",
                false,
            )
            .with_std(),
            master_pass_group_id: AuthConfig::new("MasterPassGroupId", None)
                .with_parse(parse_group_id)
                .with_format_fn(format_group_id),
            ignore_connector_faults: AuthConfig::new("IgnoreConnectorFaults", false).with_std(),
        }
    }

    pub fn build(entries: Vec<(String, String)>) -> Result<Self, ConfigError> {
        let mut configs = Self::new();
        for (key, value) in entries {
            let key = key.as_str();
            config_key_map!(gen_update_match, configs, key, value)?;
        }
        Ok(configs)
    }

    /// Current values in their textual form.
    pub fn entries(&self) -> Vec<(String, String)> {
        let configs = self;
        config_key_map!(gen_entries, configs, ())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_time_out.value).min(MAX_CONNECTION_TIMEOUT)
    }

    /// `now` plus the connection timeout. Never overflows; a deadline the
    /// platform cannot represent collapses to `now`.
    pub fn connection_deadline(&self, now: Instant) -> Instant {
        now.checked_add(self.connection_timeout()).unwrap_or(now)
    }

    pub fn is_master_pass(&self, id_token: &IdToken) -> bool {
        self.master_pass_group_id.value.as_ref() == Some(id_token)
    }

    pub fn is_master_pass_parent(&self, parent_id_token: Option<&IdToken>) -> bool {
        parent_id_token.is_some_and(|parent| self.is_master_pass(parent))
    }
}

fn parse_selection_algorithm(s: &str) -> Option<SelectionAlgorithm> {
    serde_json::from_str(&format!("\"{}\"", s.trim())).ok()
}

fn format_selection_algorithm(v: &SelectionAlgorithm) -> String {
    serde_json::to_string(v)
        .map(|s| s.trim_matches('"').to_string())
        .unwrap_or_default()
}

fn parse_group_id(s: &str) -> Option<Option<IdToken>> {
    let s = s.trim();
    Some((!s.is_empty()).then(|| IdToken::new(s)))
}

fn format_group_id(v: &Option<IdToken>) -> String {
    v.as_ref().map(|t| t.as_str().to_string()).unwrap_or_default()
}
