//! Device enrollment and the authority gate guarding privileged operations.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::device_auth::DeviceAuth;
use crate::error::LedgerError;
use crate::hardware::{digest_or_fallback, fallback_key_material, HardwarePrimitive};
use crate::key::normalize_identifier;
use crate::ledger::{LedgerStub, TransactionContext};
use crate::state_list::StateList;

/// What a caller presents to a privileged operation
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub holder: String,
    /// Hex-encoded device key returned at enrollment
    pub auth_key: String,
}

impl Credentials {
    pub fn new(holder: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            auth_key: auth_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("holder", &self.holder)
            .field("auth_key", &"<redacted>")
            .finish()
    }
}

pub struct AuthorityGate {
    config: EngineConfig,
    hardware: Arc<dyn HardwarePrimitive>,
}

impl AuthorityGate {
    /// Build a gate over a validated copy of `config`
    pub fn new(config: EngineConfig, hardware: Arc<dyn HardwarePrimitive>) -> Result<Self, LedgerError> {
        let config = config.validate()?;
        Ok(Self { config, hardware })
    }

    fn enrollments<'a>(&self, ledger: &'a dyn LedgerStub) -> StateList<'a, DeviceAuth> {
        StateList::new(ledger, self.config.auth_namespace.clone())
    }

    fn key_digest(&self, key: &[u8]) -> String {
        hex::encode(digest_or_fallback(self.hardware.as_ref(), key))
    }

    /// Enroll a device for `holder` and return its key, hex-encoded.
    ///
    /// The key is returned only here; the ledger keeps its digest. A holder can
    /// be enrolled once, later attempts fail with `AlreadyExists`.
    pub fn enroll(&self, ledger: &dyn LedgerStub, holder: &str) -> Result<String, LedgerError> {
        let holder = normalize_identifier("holder", holder)?;
        let enrollments = self.enrollments(ledger);
        if enrollments.exists(&[&holder])? {
            return Err(LedgerError::AlreadyExists(format!(
                "device already enrolled for {}",
                holder
            )));
        }

        let key = match self.hardware.random_bytes(self.config.auth_key_len) {
            Ok(bytes) if bytes.len() == self.config.auth_key_len => bytes,
            Ok(bytes) => {
                log::warn!(
                    "Device returned {} random bytes instead of {}, deriving key for {}",
                    bytes.len(),
                    self.config.auth_key_len,
                    holder
                );
                fallback_key_material(self.config.fallback_seed.as_deref(), &holder, self.config.auth_key_len)
            }
            Err(e) => {
                log::warn!("Device randomness unavailable ({}), deriving key for {}", e, holder);
                fallback_key_material(self.config.fallback_seed.as_deref(), &holder, self.config.auth_key_len)
            }
        };

        enrollments.add(&DeviceAuth::new(holder.clone(), self.key_digest(&key)))?;
        log::info!("Enrolled device for {}", holder);
        Ok(hex::encode(key))
    }

    /// Whether `supplied_key` is the key enrolled for `holder`.
    ///
    /// Fails with `NotFound` if `holder` never enrolled.
    pub fn verify(
        &self,
        ledger: &dyn LedgerStub,
        holder: &str,
        supplied_key: &str,
    ) -> Result<bool, LedgerError> {
        let holder = normalize_identifier("holder", holder)?;
        let auth = self
            .enrollments(ledger)
            .try_get(&[&holder])?
            .ok_or_else(|| LedgerError::NotFound(format!("no device enrolled for {}", holder)))?;

        let key = match hex::decode(supplied_key.trim()) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        Ok(auth.matches(&self.key_digest(&key)))
    }

    pub fn is_enrolled(&self, ledger: &dyn LedgerStub, holder: &str) -> Result<bool, LedgerError> {
        let holder = normalize_identifier("holder", holder)?;
        self.enrollments(ledger).exists(&[&holder])
    }

    /// Pass only if the caller belongs to the issuing organization and presents
    /// the device key enrolled for `credentials.holder`.
    ///
    /// Every rejection is the same `Authorization` error. Ledger transport and
    /// corrupt-record errors are not rejections and propagate unchanged.
    pub fn require_authority(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
    ) -> Result<(), LedgerError> {
        let organization = match ctx.caller_organization() {
            Ok(organization) => organization,
            Err(e) => {
                log::warn!("Authority check failed: caller identity unavailable: {}", e);
                return Err(LedgerError::Authorization);
            }
        };
        if organization != self.config.issuer_organization {
            log::warn!(
                "Authority check failed: organization {} is not {}",
                organization,
                self.config.issuer_organization
            );
            return Err(LedgerError::Authorization);
        }

        match self.verify(ctx.ledger(), &credentials.holder, &credentials.auth_key) {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::warn!("Authority check failed: key mismatch for {}", credentials.holder);
                Err(LedgerError::Authorization)
            }
            Err(e @ (LedgerError::Storage(_) | LedgerError::Deserialization(_))) => Err(e),
            Err(e) => {
                log::warn!("Authority check failed for {}: {}", credentials.holder, e);
                Err(LedgerError::Authorization)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{SoftwarePrimitive, UnavailablePrimitive};
    use crate::ledger::{MemoryLedger, Transaction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Software primitive that counts how often randomness was requested
    #[derive(Default)]
    struct RecordingPrimitive {
        random_calls: AtomicUsize,
    }

    impl HardwarePrimitive for RecordingPrimitive {
        fn random_bytes(&self, n: usize) -> Result<Vec<u8>, LedgerError> {
            self.random_calls.fetch_add(1, Ordering::SeqCst);
            SoftwarePrimitive.random_bytes(n)
        }

        fn hash(&self, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
            SoftwarePrimitive.hash(data)
        }
    }

    /// Device whose randomness comes back shorter than requested
    struct ShortReadPrimitive;

    impl HardwarePrimitive for ShortReadPrimitive {
        fn random_bytes(&self, _n: usize) -> Result<Vec<u8>, LedgerError> {
            Ok(vec![0xAB; 4])
        }

        fn hash(&self, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
            SoftwarePrimitive.hash(data)
        }
    }

    /// Context whose identity service cannot answer
    struct NoIdentity<'a> {
        ledger: &'a dyn LedgerStub,
    }

    impl TransactionContext for NoIdentity<'_> {
        fn ledger(&self) -> &dyn LedgerStub {
            self.ledger
        }

        fn caller_organization(&self) -> Result<String, LedgerError> {
            Err(LedgerError::Storage("identity service unreachable".to_string()))
        }
    }

    fn gate() -> AuthorityGate {
        AuthorityGate::new(EngineConfig::default(), Arc::new(SoftwarePrimitive)).unwrap()
    }

    #[test]
    fn test_enroll_once() {
        let ledger = MemoryLedger::new();
        let hardware = Arc::new(RecordingPrimitive::default());
        let gate = AuthorityGate::new(EngineConfig::default(), hardware.clone()).unwrap();

        let key = gate.enroll(&ledger, "Alice").unwrap();
        assert_eq!(key.len(), 32);
        assert!(gate.is_enrolled(&ledger, "alice").unwrap());

        assert!(matches!(
            gate.enroll(&ledger, "alice"),
            Err(LedgerError::AlreadyExists(_))
        ));
        // No fresh material was drawn for the rejected attempt
        assert_eq!(hardware.random_calls.load(Ordering::SeqCst), 1);
        assert!(gate.verify(&ledger, "alice", &key).unwrap());
    }

    #[test]
    fn test_key_is_not_stored() {
        let ledger = MemoryLedger::new();
        let gate = gate();
        let key = gate.enroll(&ledger, "alice").unwrap();

        let stored = ledger
            .get_state("org.medstore.deviceauth:alice")
            .unwrap()
            .unwrap();
        let stored = String::from_utf8(stored).unwrap();
        assert!(!stored.contains(&key));
    }

    #[test]
    fn test_verify() {
        let ledger = MemoryLedger::new();
        let gate = gate();
        let key = gate.enroll(&ledger, "alice").unwrap();

        assert!(gate.verify(&ledger, "ALICE", &key).unwrap());
        assert!(!gate.verify(&ledger, "alice", "00").unwrap());
        assert!(!gate.verify(&ledger, "alice", "not hex").unwrap());
        assert!(matches!(
            gate.verify(&ledger, "bob", &key),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_enroll_without_device_uses_fallback() {
        let ledger = MemoryLedger::new();
        let config = EngineConfig {
            fallback_seed: Some("site-seed".to_string()),
            ..EngineConfig::default()
        };
        let gate = AuthorityGate::new(config, Arc::new(UnavailablePrimitive)).unwrap();

        let key = gate.enroll(&ledger, "alice").unwrap();
        assert_eq!(key, hex::encode(fallback_key_material(Some("site-seed"), "alice", 16)));
        assert!(gate.verify(&ledger, "alice", &key).unwrap());
    }

    #[test]
    fn test_require_authority() {
        let ledger = MemoryLedger::new();
        let gate = gate();
        let key = gate.enroll(&ledger, "regulator").unwrap();

        let regulators = Transaction::new(&ledger, "RegulatorsMSP");
        let outsiders = Transaction::new(&ledger, "CustomersMSP");

        gate.require_authority(&regulators, &Credentials::new("regulator", key.clone()))
            .unwrap();

        for (ctx, credentials) in [
            (&outsiders, Credentials::new("regulator", key.clone())),
            (&regulators, Credentials::new("regulator", "00")),
            (&regulators, Credentials::new("nobody", key.clone())),
            (&regulators, Credentials::new("", key.clone())),
        ] {
            assert!(matches!(
                gate.require_authority(ctx, &credentials),
                Err(LedgerError::Authorization)
            ));
        }
    }

    #[test]
    fn test_unknown_caller_identity_is_rejected() {
        let ledger = MemoryLedger::new();
        let gate = gate();
        let key = gate.enroll(&ledger, "regulator").unwrap();
        let entries = ledger.len().unwrap();

        let ctx = NoIdentity { ledger: &ledger };
        assert!(matches!(
            gate.require_authority(&ctx, &Credentials::new("regulator", key)),
            Err(LedgerError::Authorization)
        ));
        assert_eq!(ledger.len().unwrap(), entries);
    }

    #[test]
    fn test_short_device_read_uses_fallback() {
        let ledger = MemoryLedger::new();
        let gate = AuthorityGate::new(EngineConfig::default(), Arc::new(ShortReadPrimitive)).unwrap();

        let key = gate.enroll(&ledger, "alice").unwrap();
        assert_eq!(key, hex::encode(fallback_key_material(None, "alice", 16)));
        assert!(gate.verify(&ledger, "alice", &key).unwrap());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig {
            auth_key_len: 64,
            ..EngineConfig::default()
        };
        assert!(matches!(
            AuthorityGate::new(config, Arc::new(SoftwarePrimitive)),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn test_require_authority_surfaces_storage_errors() {
        let ledger = MemoryLedger::new();
        let gate = gate();
        let key = gate.enroll(&ledger, "regulator").unwrap();
        ledger.set_unavailable(true);

        let ctx = Transaction::new(&ledger, "RegulatorsMSP");
        assert!(matches!(
            gate.require_authority(&ctx, &Credentials::new("regulator", key)),
            Err(LedgerError::Storage(_))
        ));
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let credentials = Credentials::new("alice", "deadbeef");
        assert!(!format!("{:?}", credentials).contains("deadbeef"));
    }
}
