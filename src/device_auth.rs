//! Device enrollment record: one per holder, written once.
//!
//! The ledger keeps only the hex SHA-256 digest of the device key; the key
//! itself is handed to the caller at enrollment and never stored.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::LedgerError;
use crate::state_list::LedgerState;

/// `class` tag written into every stored enrollment document
pub const DEVICE_AUTH_CLASS: &str = "org.medstore.deviceauth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthRecord {
    pub holder: String,
    pub auth_key: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuth {
    holder: String,
    key_digest: String,
}

impl DeviceAuth {
    pub fn new(holder: impl Into<String>, key_digest: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            key_digest: key_digest.into(),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Whether `digest` (hex) equals the enrolled key's digest
    pub fn matches(&self, digest: &str) -> bool {
        let stored = self.key_digest.as_bytes();
        let supplied = digest.as_bytes();
        if stored.len() != supplied.len() {
            // Same work as a full-length comparison
            let _ = stored.ct_eq(stored);
            return false;
        }
        stored.ct_eq(supplied).into()
    }
}

impl LedgerState for DeviceAuth {
    fn split_key(&self) -> Vec<String> {
        vec![self.holder.clone()]
    }

    fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        let record = DeviceAuthRecord {
            holder: self.holder.clone(),
            auth_key: self.key_digest.clone(),
            class: DEVICE_AUTH_CLASS.to_string(),
            key: self.holder.clone(),
        };
        serde_json::to_vec(&record).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let record: DeviceAuthRecord = serde_json::from_slice(bytes)?;
        Ok(Self::new(record.holder, record.auth_key))
    }
}
