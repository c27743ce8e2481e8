//! Hardware-backed randomness and hashing.
//!
//! The engine talks to the device (typically a TPM) only through
//! [`HardwarePrimitive`]. The digest contract is SHA-256, so a digest computed in
//! software is interchangeable with one computed by the device.

use crate::error::LedgerError;
use rand::RngCore;
use sha2::{Digest, Sha256};

// Domain separator for the deterministic key fallback
const FALLBACK_KEY_CONTEXT: &str = "medsupply-ledger 2024 device-auth fallback";

/// Random-number and hash service of the host's security device
pub trait HardwarePrimitive: Send + Sync {
    /// Produce `n` bytes of fresh random material
    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, LedgerError>;

    /// SHA-256 digest of `data`
    fn hash(&self, data: &[u8]) -> Result<Vec<u8>, LedgerError>;
}

/// Primitive backed by the operating system's CSPRNG and a software SHA-256
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwarePrimitive;

impl HardwarePrimitive for SoftwarePrimitive {
    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, LedgerError> {
        let mut bytes = vec![0u8; n];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| LedgerError::Hardware(format!("OS randomness unavailable: {}", e)))?;
        Ok(bytes)
    }

    fn hash(&self, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        Ok(software_sha256(data))
    }
}

/// Primitive for hosts without a security device; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePrimitive;

impl HardwarePrimitive for UnavailablePrimitive {
    fn random_bytes(&self, _n: usize) -> Result<Vec<u8>, LedgerError> {
        Err(LedgerError::Hardware("no hardware device present".to_string()))
    }

    fn hash(&self, _data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        Err(LedgerError::Hardware("no hardware device present".to_string()))
    }
}

pub fn software_sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Hash with the device, falling back to the identical software digest when the device fails
pub fn digest_or_fallback(hardware: &dyn HardwarePrimitive, data: &[u8]) -> Vec<u8> {
    match hardware.hash(data) {
        Ok(digest) => digest,
        Err(e) => {
            log::warn!("Hardware hash unavailable, using software SHA-256: {}", e);
            software_sha256(data)
        }
    }
}

/// Deterministic key material used when the device cannot produce randomness.
///
/// Derived as `blake3::derive_key(context, seed || 0x00 || holder)` and truncated
/// to `len` bytes (at most 32). Anyone who knows the seed and the holder can
/// recompute it, so deployments relying on it should configure a secret seed.
pub fn fallback_key_material(seed: Option<&str>, holder: &str, len: usize) -> Vec<u8> {
    let mut material = Vec::new();
    if let Some(seed) = seed {
        material.extend_from_slice(seed.as_bytes());
    }
    material.push(0);
    material.extend_from_slice(holder.as_bytes());

    let derived = blake3::derive_key(FALLBACK_KEY_CONTEXT, &material);
    derived[..len.min(derived.len())].to_vec()
}
