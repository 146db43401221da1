use crate::error::{BrokerError, BrokerResult};
use uuid::Uuid;

/// A 16-byte key id, validated at construction: key ids are always exactly
/// 16 bytes.
pub type KeyId = Uuid;

pub(crate) fn parse_key_id(bytes: &[u8]) -> BrokerResult<KeyId> {
    if bytes.len() != 16 {
        return Err(BrokerError::InvalidArgument(format!(
            "key id must be exactly 16 bytes, got {}",
            bytes.len()
        )));
    }
    // `uuid::Uuid::from_slice` only fails on length, already checked above.
    Uuid::from_slice(bytes).map_err(|e| BrokerError::InvalidArgument(e.to_string()))
}

pub(crate) fn validate_alt_name(name: &str) -> BrokerResult<()> {
    if name.is_empty() {
        return Err(BrokerError::InvalidArgument(
            "key alt name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// The identity (or identities) a registry entry is known by. An entry
/// always has at least one of `id`/`alt_names` populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIdentity {
    pub id: Option<KeyId>,
    pub alt_names: Vec<String>,
}

impl KeyIdentity {
    pub fn from_id(id: KeyId) -> Self {
        Self {
            id: Some(id),
            alt_names: Vec::new(),
        }
    }

    pub fn from_alt_name(name: String) -> Self {
        Self {
            id: None,
            alt_names: vec![name],
        }
    }

    pub fn has_alt_name(&self, name: &str) -> bool {
        self.alt_names.iter().any(|n| n == name)
    }

    /// Merge another identity into this one, deduplicating alt names. Used
    /// when a key document resolves both an id-addressed and an
    /// alt-name-addressed entry to the same logical key.
    pub fn merge(&mut self, other: &KeyIdentity) {
        if self.id.is_none() {
            self.id = other.id;
        }
        for name in &other.alt_names {
            if !self.has_alt_name(name) {
                self.alt_names.push(name.clone());
            }
        }
    }
}
