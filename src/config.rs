//! Engine configuration.
//!
//! Loaded from a TOML file (every key optional), then overridden from the
//! environment:
//!
//! - `MEDSUPPLY_ISSUER_ORG`
//! - `MEDSUPPLY_DEFAULT_CUSTODIAN`
//! - `MEDSUPPLY_FALLBACK_SEED`

use std::path::Path;

use serde::Deserialize;

use crate::error::LedgerError;
use crate::key::{normalize_identifier, KEY_DELIMITER};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Organization whose members may issue, delete and override assets
    pub issuer_organization: String,
    /// Holder of every asset while it is AVAILABLE
    pub default_custodian: String,
    /// Key namespace of medical-supply assets
    pub supply_namespace: String,
    /// Key namespace of device-auth records
    pub auth_namespace: String,
    /// Bytes of secret material requested from the device at enrollment
    pub auth_key_len: usize,
    /// Optional seed for the deterministic key fallback
    pub fallback_seed: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            issuer_organization: "RegulatorsMSP".to_string(),
            default_custodian: "medstore".to_string(),
            supply_namespace: "org.medstore.medicalsupplylist".to_string(),
            auth_namespace: "org.medstore.deviceauth".to_string(),
            auth_key_len: 16,
            fallback_seed: None,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, LedgerError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `MEDSUPPLY_*` environment overrides
    pub fn apply_env_overrides(self) -> Result<Self, LedgerError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(org) = lookup("MEDSUPPLY_ISSUER_ORG") {
            self.issuer_organization = org;
        }
        if let Some(custodian) = lookup("MEDSUPPLY_DEFAULT_CUSTODIAN") {
            self.default_custodian = custodian;
        }
        if let Some(seed) = lookup("MEDSUPPLY_FALLBACK_SEED") {
            self.fallback_seed = Some(seed);
        }
        self.validate()
    }

    /// Check invariants and bring the custodian into canonical form
    pub fn validate(mut self) -> Result<Self, LedgerError> {
        if self.issuer_organization.trim().is_empty() {
            return Err(LedgerError::Config("issuer_organization must not be empty".to_string()));
        }
        for (field, namespace) in [
            ("supply_namespace", &self.supply_namespace),
            ("auth_namespace", &self.auth_namespace),
        ] {
            if namespace.is_empty() || namespace.contains(KEY_DELIMITER) {
                return Err(LedgerError::Config(format!(
                    "{} must be non-empty and free of '{}'",
                    field, KEY_DELIMITER
                )));
            }
        }
        if self.supply_namespace == self.auth_namespace {
            return Err(LedgerError::Config(
                "supply_namespace and auth_namespace must differ".to_string(),
            ));
        }
        if self.auth_key_len == 0 || self.auth_key_len > 32 {
            return Err(LedgerError::Config("auth_key_len must be within 1..=32".to_string()));
        }
        self.default_custodian = normalize_identifier("default_custodian", &self.default_custodian)
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        Ok(self)
    }
}
