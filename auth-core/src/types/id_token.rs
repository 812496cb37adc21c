use core::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};
use std::collections::hash_map::DefaultHasher;

/// Identity of a presented credential: RFID UID, eMAID, group id.
///
/// Equality, ordering and hashing ignore ASCII case, so `"abc"` and `"ABC"`
/// name the same token everywhere: as map keys, in reservation matching and
/// in parent/master-pass comparisons.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq)]
#[serde(transparent)]
pub struct IdToken(String);

impl IdToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
    /// Loggable form that does not leak the token value.
    pub fn redacted(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("[redacted] hash: {:016x}", hasher.finish())
    }
    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for IdToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for IdToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.folded() {
            state.write_u8(b);
        }
        state.write_u8(0xff);
    }
}

impl Ord for IdToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl PartialOrd for IdToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IdToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}
