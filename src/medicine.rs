//! Medical-supply asset and its lifecycle.
//!
//! ```text
//! issue ──▶ AVAILABLE ──request──▶ REQUESTED ──approve──▶ SEND
//!               ▲                      │
//!               └──cancel / reject─────┘
//! ```
//!
//! `change_status` and `change_holder` are privileged overrides that bypass the
//! graph above. The stored form is [`MedicalSupplyRecord`]; [`MedicalSupply`]
//! keeps `state` and `holder` private so they only move through the methods here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::key::make_key;
use crate::state_list::LedgerState;

/// `class` tag written into every stored asset document
pub const MEDICAL_SUPPLY_CLASS: &str = "org.medstore.medicalsupply";

/// Lifecycle state of an asset. The numeric values are the persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SupplyState {
    Available = 1,
    Requested = 2,
    Send = 3,
}

impl SupplyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SupplyState::Available => "AVAILABLE",
            SupplyState::Requested => "REQUESTED",
            SupplyState::Send => "SEND",
        }
    }

    /// Parse a status name as accepted by the manual override, ignoring case
    pub fn from_name(name: &str) -> Result<Self, LedgerError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(SupplyState::Available),
            "requested" => Ok(SupplyState::Requested),
            "send" => Ok(SupplyState::Send),
            other => Err(LedgerError::Validation(format!("unknown status '{}'", other))),
        }
    }
}

impl TryFrom<u8> for SupplyState {
    type Error = LedgerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SupplyState::Available),
            2 => Ok(SupplyState::Requested),
            3 => Ok(SupplyState::Send),
            other => Err(LedgerError::Deserialization(format!(
                "unknown supply state value {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SupplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of an asset, as stored on the ledger and returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalSupplyRecord {
    pub med_name: String,
    pub med_number: String,
    pub disease: String,
    pub expiration: String,
    pub price: String,
    pub holder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub current_state: u8,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub key: String,
}

/// Descriptive fields supplied when issuing a new asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedicine {
    pub med_name: String,
    pub med_number: String,
    pub disease: String,
    pub expiration: String,
    pub price: String,
}

impl NewMedicine {
    pub fn new(
        med_name: impl Into<String>,
        med_number: impl Into<String>,
        disease: impl Into<String>,
        expiration: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        Self {
            med_name: med_name.into(),
            med_number: med_number.into(),
            disease: disease.into(),
            expiration: expiration.into(),
            price: price.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalSupply {
    med_name: String,
    med_number: String,
    disease: String,
    expiration: String,
    price: String,
    holder: String,
    checksum: Option<String>,
    state: SupplyState,
}

impl MedicalSupply {
    /// A freshly issued asset: AVAILABLE and held by `custodian`.
    ///
    /// Name, number and custodian are expected in canonical (normalized) form.
    pub fn issue(medicine: NewMedicine, custodian: &str) -> Self {
        Self {
            med_name: medicine.med_name,
            med_number: medicine.med_number,
            disease: medicine.disease,
            expiration: medicine.expiration,
            price: medicine.price,
            holder: custodian.to_string(),
            checksum: None,
            state: SupplyState::Available,
        }
    }

    pub fn med_name(&self) -> &str {
        &self.med_name
    }

    pub fn med_number(&self) -> &str {
        &self.med_number
    }

    pub fn disease(&self) -> &str {
        &self.disease
    }

    pub fn expiration(&self) -> &str {
        &self.expiration
    }

    pub fn price(&self) -> &str {
        &self.price
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn state(&self) -> SupplyState {
        self.state
    }

    /// `name:number`, as used in log lines and error messages
    pub fn label(&self) -> String {
        make_key(&[&self.med_name, &self.med_number])
    }

    /// Bytes covered by the integrity checksum: the immutable descriptive fields
    pub fn checksum_input(&self) -> Vec<u8> {
        [
            self.med_name.as_str(),
            self.med_number.as_str(),
            self.disease.as_str(),
            self.expiration.as_str(),
            self.price.as_str(),
        ]
        .join("|")
        .into_bytes()
    }

    pub fn set_checksum(&mut self, checksum: String) {
        self.checksum = Some(checksum);
    }

    fn require_state(&self, required: SupplyState) -> Result<(), LedgerError> {
        if self.state != required {
            return Err(LedgerError::Precondition(format!(
                "medicine {} must be {}, found {}",
                self.label(),
                required,
                self.state
            )));
        }
        Ok(())
    }

    /// AVAILABLE -> REQUESTED; only while the custodian still holds the asset
    pub fn request(&mut self, consumer: &str, custodian: &str) -> Result<(), LedgerError> {
        self.require_state(SupplyState::Available)?;
        if self.holder != custodian {
            return Err(LedgerError::Precondition(format!(
                "medicine {} is held by {}, not the custodian",
                self.label(),
                self.holder
            )));
        }
        self.holder = consumer.to_string();
        self.state = SupplyState::Requested;
        Ok(())
    }

    /// REQUESTED -> AVAILABLE; only the consumer who requested it may cancel
    pub fn cancel_request(&mut self, consumer: &str, custodian: &str) -> Result<(), LedgerError> {
        self.require_state(SupplyState::Requested)?;
        if self.holder != consumer {
            return Err(LedgerError::Precondition(format!(
                "medicine {} was not requested by {}",
                self.label(),
                consumer
            )));
        }
        self.holder = custodian.to_string();
        self.state = SupplyState::Available;
        Ok(())
    }

    /// REQUESTED -> SEND
    pub fn approve(&mut self) -> Result<(), LedgerError> {
        self.require_state(SupplyState::Requested)?;
        self.state = SupplyState::Send;
        Ok(())
    }

    /// REQUESTED -> AVAILABLE, back with the custodian
    pub fn reject(&mut self, custodian: &str) -> Result<(), LedgerError> {
        self.require_state(SupplyState::Requested)?;
        self.holder = custodian.to_string();
        self.state = SupplyState::Available;
        Ok(())
    }

    pub fn override_state(&mut self, state: SupplyState) {
        self.state = state;
    }

    pub fn change_holder(&mut self, holder: &str) -> Result<(), LedgerError> {
        if holder.trim().is_empty() {
            return Err(LedgerError::Validation("new holder must not be empty".to_string()));
        }
        self.holder = holder.to_string();
        Ok(())
    }

    pub fn to_record(&self) -> MedicalSupplyRecord {
        MedicalSupplyRecord {
            med_name: self.med_name.clone(),
            med_number: self.med_number.clone(),
            disease: self.disease.clone(),
            expiration: self.expiration.clone(),
            price: self.price.clone(),
            holder: self.holder.clone(),
            checksum: self.checksum.clone(),
            current_state: self.state.as_u8(),
            class: MEDICAL_SUPPLY_CLASS.to_string(),
            key: self.label(),
        }
    }
}

impl TryFrom<MedicalSupplyRecord> for MedicalSupply {
    type Error = LedgerError;

    fn try_from(record: MedicalSupplyRecord) -> Result<Self, Self::Error> {
        let state = SupplyState::try_from(record.current_state)?;
        Ok(Self {
            med_name: record.med_name,
            med_number: record.med_number,
            disease: record.disease,
            expiration: record.expiration,
            price: record.price,
            holder: record.holder,
            checksum: record.checksum,
            state,
        })
    }
}

impl LedgerState for MedicalSupply {
    fn split_key(&self) -> Vec<String> {
        vec![self.med_name.clone(), self.med_number.clone()]
    }

    fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(&self.to_record()).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let record: MedicalSupplyRecord = serde_json::from_slice(bytes)?;
        MedicalSupply::try_from(record)
    }
}
