//! Contract surface: the operations callers submit against the ledger.
//!
//! Every operation runs against one [`TransactionContext`]. Privileged ones pass
//! through the [`AuthorityGate`] first, and every precondition is checked before
//! the first write, so a failed call leaves the world state untouched.

use std::sync::Arc;

use crate::authority::{AuthorityGate, Credentials};
use crate::config::EngineConfig;
use crate::error::LedgerError;
use crate::hardware::{digest_or_fallback, HardwarePrimitive, SoftwarePrimitive};
use crate::key::normalize_identifier;
use crate::ledger::{LedgerStub, TransactionContext};
use crate::medicine::{MedicalSupply, MedicalSupplyRecord, NewMedicine, SupplyState};
use crate::state_list::StateList;

/// Reference inventory written by [`MedicalSupplyContract::init_ledger`]:
/// name, number, disease, expiration, price
const REFERENCE_INVENTORY: [(&str, &str, &str, &str, &str); 11] = [
    ("Aspirin", "00001", "Pain management", "2022.05.09", "$10"),
    ("Vicodin", "00002", "Pain management", "2022.07.01", "$14"),
    ("Synthroid", "00003", "Thyroid deficiency", "2021.12.03", "$11"),
    ("Delasone", "00004", "Arthritis", "2022.09.12", "$5"),
    ("Amoxil", "00005", "Bacterial infections", "2022.07.08", "$9"),
    ("Neurontin", "00006", "Seizures", "2022.03.25", "$13"),
    ("Zestril", "00007", "Blood pressure", "2022.03.11", "$7"),
    ("Lipitor", "00008", "High cholesterol", "2022.01.06", "$12"),
    ("Glucophage", "00009", "Type 2 diabetes", "2022.04.24", "$8"),
    ("Zofran", "00010", "Nausea", "2022.02.04", "$13"),
    ("Ibuprofen", "00011", "Fever", "2022.02.28", "$12"),
];

pub struct MedicalSupplyContract {
    config: EngineConfig,
    gate: AuthorityGate,
    hardware: Arc<dyn HardwarePrimitive>,
}

impl MedicalSupplyContract {
    pub fn new(config: EngineConfig, hardware: Arc<dyn HardwarePrimitive>) -> Result<Self, LedgerError> {
        let config = config.validate()?;
        let gate = AuthorityGate::new(config.clone(), hardware.clone())?;
        Ok(Self {
            config,
            gate,
            hardware,
        })
    }

    /// Contract backed by OS randomness and software hashing
    pub fn with_software_primitive(config: EngineConfig) -> Result<Self, LedgerError> {
        Self::new(config, Arc::new(SoftwarePrimitive))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn supplies<'a>(&self, ledger: &'a dyn LedgerStub) -> StateList<'a, MedicalSupply> {
        StateList::new(ledger, self.config.supply_namespace.clone())
    }

    fn checksum_of(&self, supply: &MedicalSupply) -> String {
        hex::encode(digest_or_fallback(self.hardware.as_ref(), &supply.checksum_input()))
    }

    fn load(
        &self,
        ctx: &dyn TransactionContext,
        med_name: &str,
        med_number: &str,
    ) -> Result<MedicalSupply, LedgerError> {
        let name = normalize_identifier("medicine name", med_name)?;
        let number = normalize_identifier("medicine number", med_number)?;
        self.supplies(ctx.ledger()).get(&[&name, &number])
    }

    fn store(&self, ctx: &dyn TransactionContext, supply: &MedicalSupply) -> Result<MedicalSupplyRecord, LedgerError> {
        self.supplies(ctx.ledger()).update(supply)?;
        Ok(supply.to_record())
    }

    fn collect_where<P>(
        &self,
        ctx: &dyn TransactionContext,
        prefix: &[&str],
        predicate: P,
    ) -> Result<Vec<MedicalSupplyRecord>, LedgerError>
    where
        P: Fn(&MedicalSupply) -> bool,
    {
        let mut records = Vec::new();
        for supply in self.supplies(ctx.ledger()).scan_by_prefix(prefix)? {
            let supply = supply?;
            if predicate(&supply) {
                records.push(supply.to_record());
            }
        }
        Ok(records)
    }

    fn build(&self, medicine: NewMedicine) -> Result<MedicalSupply, LedgerError> {
        let medicine = NewMedicine {
            med_name: normalize_identifier("medicine name", &medicine.med_name)?,
            med_number: normalize_identifier("medicine number", &medicine.med_number)?,
            ..medicine
        };
        let mut supply = MedicalSupply::issue(medicine, &self.config.default_custodian);
        let checksum = self.checksum_of(&supply);
        supply.set_checksum(checksum);
        Ok(supply)
    }

    /// Seed the reference inventory, overwriting any existing entries under the same keys
    pub fn init_ledger(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
    ) -> Result<Vec<MedicalSupplyRecord>, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;

        let supplies = REFERENCE_INVENTORY
            .iter()
            .map(|(name, number, disease, expiration, price)| {
                self.build(NewMedicine::new(*name, *number, *disease, *expiration, *price))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let list = self.supplies(ctx.ledger());
        for supply in &supplies {
            list.add(supply)?;
        }
        log::info!("Seeded {} reference medicines", supplies.len());
        Ok(supplies.iter().map(MedicalSupply::to_record).collect())
    }

    /// Create a new AVAILABLE asset held by the default custodian
    pub fn issue(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
        medicine: NewMedicine,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;

        let supply = self.build(medicine)?;
        let list = self.supplies(ctx.ledger());
        if list.exists(&[supply.med_name(), supply.med_number()])? {
            return Err(LedgerError::AlreadyExists(format!("medicine {}", supply.label())));
        }
        list.add(&supply)?;
        log::info!("Issued medicine {} to {}", supply.label(), supply.holder());
        Ok(supply.to_record())
    }

    pub fn request(
        &self,
        ctx: &dyn TransactionContext,
        med_name: &str,
        med_number: &str,
        consumer: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        let consumer = normalize_identifier("holder", consumer)?;
        let mut supply = self.load(ctx, med_name, med_number)?;
        supply.request(&consumer, &self.config.default_custodian)?;
        let record = self.store(ctx, &supply)?;
        log::info!("Medicine {} requested by {}", supply.label(), consumer);
        Ok(record)
    }

    pub fn cancel_request(
        &self,
        ctx: &dyn TransactionContext,
        med_name: &str,
        med_number: &str,
        consumer: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        let consumer = normalize_identifier("holder", consumer)?;
        let mut supply = self.load(ctx, med_name, med_number)?;
        supply.cancel_request(&consumer, &self.config.default_custodian)?;
        let record = self.store(ctx, &supply)?;
        log::info!("Request for medicine {} cancelled by {}", supply.label(), consumer);
        Ok(record)
    }

    pub fn approve_request(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
        med_name: &str,
        med_number: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        let mut supply = self.load(ctx, med_name, med_number)?;
        supply.approve()?;
        let record = self.store(ctx, &supply)?;
        log::info!("Medicine {} sent to {}", supply.label(), supply.holder());
        Ok(record)
    }

    pub fn reject_request(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
        med_name: &str,
        med_number: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        let mut supply = self.load(ctx, med_name, med_number)?;
        supply.reject(&self.config.default_custodian)?;
        let record = self.store(ctx, &supply)?;
        log::info!("Request for medicine {} rejected", supply.label());
        Ok(record)
    }

    /// Manual override of the lifecycle state: `available`, `requested` or `send`
    pub fn change_status(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
        med_name: &str,
        med_number: &str,
        status: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        let state = SupplyState::from_name(status)?;
        let mut supply = self.load(ctx, med_name, med_number)?;
        supply.override_state(state);
        let record = self.store(ctx, &supply)?;
        log::info!("Medicine {} status set to {}", supply.label(), state);
        Ok(record)
    }

    /// Manual override of the holder; the state is left as is
    pub fn change_holder(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
        med_name: &str,
        med_number: &str,
        new_holder: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        if new_holder.trim().is_empty() {
            return Err(LedgerError::Validation("new holder must not be empty".to_string()));
        }
        let new_holder = normalize_identifier("holder", new_holder)?;
        let mut supply = self.load(ctx, med_name, med_number)?;
        supply.change_holder(&new_holder)?;
        let record = self.store(ctx, &supply)?;
        log::info!("Medicine {} now held by {}", supply.label(), new_holder);
        Ok(record)
    }

    pub fn delete_medicine(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
        med_name: &str,
        med_number: &str,
    ) -> Result<(), LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        let supply = self.load(ctx, med_name, med_number)?;
        self.supplies(ctx.ledger())
            .delete(&[supply.med_name(), supply.med_number()])?;
        log::info!("Deleted medicine {}", supply.label());
        Ok(())
    }

    pub fn get_medicine(
        &self,
        ctx: &dyn TransactionContext,
        med_name: &str,
        med_number: &str,
    ) -> Result<MedicalSupplyRecord, LedgerError> {
        Ok(self.load(ctx, med_name, med_number)?.to_record())
    }

    /// AVAILABLE assets whose name component equals `med_name`, in key order
    pub fn search_by_name(
        &self,
        ctx: &dyn TransactionContext,
        med_name: &str,
    ) -> Result<Vec<MedicalSupplyRecord>, LedgerError> {
        let name = normalize_identifier("medicine name", med_name)?;
        self.collect_where(ctx, &[&name], |s| s.state() == SupplyState::Available)
    }

    /// Every asset, in key order
    pub fn check_history(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
    ) -> Result<Vec<MedicalSupplyRecord>, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        self.collect_where(ctx, &[], |_| true)
    }

    pub fn check_available(&self, ctx: &dyn TransactionContext) -> Result<Vec<MedicalSupplyRecord>, LedgerError> {
        self.collect_where(ctx, &[], |s| s.state() == SupplyState::Available)
    }

    pub fn check_requested(
        &self,
        ctx: &dyn TransactionContext,
        credentials: &Credentials,
    ) -> Result<Vec<MedicalSupplyRecord>, LedgerError> {
        self.gate.require_authority(ctx, credentials)?;
        self.collect_where(ctx, &[], |s| s.state() == SupplyState::Requested)
    }

    /// Assets currently held by `holder`, in any state
    pub fn check_user_history(
        &self,
        ctx: &dyn TransactionContext,
        holder: &str,
    ) -> Result<Vec<MedicalSupplyRecord>, LedgerError> {
        let holder = normalize_identifier("holder", holder)?;
        self.collect_where(ctx, &[], |s| s.holder() == holder)
    }

    /// Recompute the integrity checksum; `false` if it changed or was never set
    pub fn verify_checksum(
        &self,
        ctx: &dyn TransactionContext,
        med_name: &str,
        med_number: &str,
    ) -> Result<bool, LedgerError> {
        let supply = self.load(ctx, med_name, med_number)?;
        Ok(match supply.checksum() {
            Some(stored) => stored == self.checksum_of(&supply),
            None => false,
        })
    }

    /// Enroll a device for `holder`; the returned hex key is never retrievable again
    pub fn enroll_device(&self, ctx: &dyn TransactionContext, holder: &str) -> Result<String, LedgerError> {
        self.gate.enroll(ctx.ledger(), holder)
    }

    pub fn is_enrolled(&self, ctx: &dyn TransactionContext, holder: &str) -> Result<bool, LedgerError> {
        self.gate.is_enrolled(ctx.ledger(), holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, Transaction};

    const REGULATORS: &str = "RegulatorsMSP";

    struct Fixture {
        ledger: MemoryLedger,
        contract: MedicalSupplyContract,
        credentials: Credentials,
    }

    impl Fixture {
        fn new() -> Self {
            let ledger = MemoryLedger::new();
            let contract = MedicalSupplyContract::with_software_primitive(EngineConfig::default()).unwrap();
            let key = contract
                .enroll_device(&Transaction::new(&ledger, REGULATORS), "regulator")
                .unwrap();
            Self {
                ledger,
                contract,
                credentials: Credentials::new("regulator", key),
            }
        }

        fn ctx(&self) -> Transaction<'_> {
            Transaction::new(&self.ledger, REGULATORS)
        }

        fn issue(&self, name: &str, number: &str) -> MedicalSupplyRecord {
            self.contract
                .issue(
                    &self.ctx(),
                    &self.credentials,
                    NewMedicine::new(name, number, "Pain management", "2022.05.09", "$10"),
                )
                .unwrap()
        }
    }

    fn names(records: &[MedicalSupplyRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| format!("{}:{}", r.med_name, r.med_number))
            .collect()
    }

    #[test]
    fn test_issue_then_request() {
        let f = Fixture::new();
        let issued = f.issue("Aspirin", "00001");
        assert_eq!(issued.med_name, "aspirin");
        assert_eq!(issued.current_state, SupplyState::Available.as_u8());
        assert_eq!(issued.holder, "medstore");
        assert!(issued.checksum.is_some());

        let requested = f.contract.request(&f.ctx(), "aspirin", "00001", "Alice").unwrap();
        assert_eq!(requested.current_state, SupplyState::Requested.as_u8());
        assert_eq!(requested.holder, "alice");
        assert_eq!(f.contract.get_medicine(&f.ctx(), "ASPIRIN", "00001").unwrap(), requested);
    }

    #[test]
    fn test_issue_duplicate_rejected() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        let result = f.contract.issue(
            &f.ctx(),
            &f.credentials,
            NewMedicine::new("Aspirin ", "00001", "Other", "2030.01.01", "$1"),
        );
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));
        assert_eq!(
            f.contract.get_medicine(&f.ctx(), "aspirin", "00001").unwrap().disease,
            "Pain management"
        );
    }

    #[test]
    fn test_request_on_requested_fails_unchanged() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.contract.request(&f.ctx(), "aspirin", "00001", "alice").unwrap();
        let before = f.contract.get_medicine(&f.ctx(), "aspirin", "00001").unwrap();

        let result = f.contract.request(&f.ctx(), "aspirin", "00001", "bob");
        assert!(matches!(result, Err(LedgerError::Precondition(_))));
        assert_eq!(f.contract.get_medicine(&f.ctx(), "aspirin", "00001").unwrap(), before);
    }

    #[test]
    fn test_approve_twice() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.contract.request(&f.ctx(), "aspirin", "00001", "alice").unwrap();

        let sent = f
            .contract
            .approve_request(&f.ctx(), &f.credentials, "aspirin", "00001")
            .unwrap();
        assert_eq!(sent.current_state, SupplyState::Send.as_u8());
        assert_eq!(sent.holder, "alice");

        let again = f
            .contract
            .approve_request(&f.ctx(), &f.credentials, "aspirin", "00001");
        assert!(matches!(again, Err(LedgerError::Precondition(_))));
    }

    #[test]
    fn test_cancel_by_other_consumer_fails() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.contract.request(&f.ctx(), "aspirin", "00001", "alice").unwrap();

        let result = f.contract.cancel_request(&f.ctx(), "aspirin", "00001", "bob");
        assert!(matches!(result, Err(LedgerError::Precondition(_))));
        let current = f.contract.get_medicine(&f.ctx(), "aspirin", "00001").unwrap();
        assert_eq!(current.holder, "alice");
        assert_eq!(current.current_state, SupplyState::Requested.as_u8());

        let cancelled = f
            .contract
            .cancel_request(&f.ctx(), "aspirin", "00001", "alice")
            .unwrap();
        assert_eq!(cancelled.current_state, SupplyState::Available.as_u8());
        assert_eq!(cancelled.holder, "medstore");
    }

    #[test]
    fn test_reject_returns_to_custodian() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.contract.request(&f.ctx(), "aspirin", "00001", "alice").unwrap();

        let rejected = f
            .contract
            .reject_request(&f.ctx(), &f.credentials, "aspirin", "00001")
            .unwrap();
        assert_eq!(rejected.current_state, SupplyState::Available.as_u8());
        assert_eq!(rejected.holder, "medstore");
    }

    #[test]
    fn test_wrong_organization_writes_nothing() {
        let f = Fixture::new();
        let entries_before = f.ledger.len().unwrap();
        let outsider = Transaction::new(&f.ledger, "CustomersMSP");

        let result = f.contract.issue(
            &outsider,
            &f.credentials,
            NewMedicine::new("aspirin", "00001", "Pain management", "2022.05.09", "$10"),
        );
        assert!(matches!(result, Err(LedgerError::Authorization)));
        assert_eq!(f.ledger.len().unwrap(), entries_before);

        assert!(matches!(
            f.contract.init_ledger(&outsider, &f.credentials),
            Err(LedgerError::Authorization)
        ));
        assert_eq!(f.ledger.len().unwrap(), entries_before);
    }

    #[test]
    fn test_privileged_operations_require_authority() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.contract.request(&f.ctx(), "aspirin", "00001", "alice").unwrap();
        let forged = Credentials::new("regulator", "00112233");
        let ctx = f.ctx();

        assert!(matches!(
            f.contract.approve_request(&ctx, &forged, "aspirin", "00001"),
            Err(LedgerError::Authorization)
        ));
        assert!(matches!(
            f.contract.reject_request(&ctx, &forged, "aspirin", "00001"),
            Err(LedgerError::Authorization)
        ));
        assert!(matches!(
            f.contract.change_status(&ctx, &forged, "aspirin", "00001", "send"),
            Err(LedgerError::Authorization)
        ));
        assert!(matches!(
            f.contract.change_holder(&ctx, &forged, "aspirin", "00001", "mallory"),
            Err(LedgerError::Authorization)
        ));
        assert!(matches!(
            f.contract.delete_medicine(&ctx, &forged, "aspirin", "00001"),
            Err(LedgerError::Authorization)
        ));
        assert!(matches!(
            f.contract.check_history(&ctx, &forged),
            Err(LedgerError::Authorization)
        ));
        assert!(matches!(
            f.contract.check_requested(&ctx, &forged),
            Err(LedgerError::Authorization)
        ));

        let current = f.contract.get_medicine(&ctx, "aspirin", "00001").unwrap();
        assert_eq!(current.holder, "alice");
        assert_eq!(current.current_state, SupplyState::Requested.as_u8());
    }

    #[test]
    fn test_search_by_name_is_component_exact() {
        let f = Fixture::new();
        f.issue("aspirin", "00002");
        f.issue("aspirin", "00001");
        f.issue("aspirinplus", "00001");
        f.issue("vicodin", "00003");
        f.issue("aspirin", "00003");
        f.contract.request(&f.ctx(), "aspirin", "00003", "alice").unwrap();

        let found = f.contract.search_by_name(&f.ctx(), "Aspirin").unwrap();
        assert_eq!(names(&found), vec!["aspirin:00001", "aspirin:00002"]);
        assert_eq!(f.ledger.open_cursors(), 0);
    }

    #[test]
    fn test_listings() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.issue("vicodin", "00002");
        f.issue("zofran", "00010");
        f.contract.request(&f.ctx(), "vicodin", "00002", "alice").unwrap();
        f.contract.request(&f.ctx(), "zofran", "00010", "alice").unwrap();
        f.contract
            .approve_request(&f.ctx(), &f.credentials, "zofran", "00010")
            .unwrap();

        let history = f.contract.check_history(&f.ctx(), &f.credentials).unwrap();
        assert_eq!(history.len(), 3);

        let available = f.contract.check_available(&f.ctx()).unwrap();
        assert_eq!(names(&available), vec!["aspirin:00001"]);

        let requested = f.contract.check_requested(&f.ctx(), &f.credentials).unwrap();
        assert_eq!(names(&requested), vec!["vicodin:00002"]);

        let alice = f.contract.check_user_history(&f.ctx(), "ALICE").unwrap();
        assert_eq!(names(&alice), vec!["vicodin:00002", "zofran:00010"]);
    }

    #[test]
    fn test_change_status_and_holder() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");

        let sent = f
            .contract
            .change_status(&f.ctx(), &f.credentials, "aspirin", "00001", "SEND")
            .unwrap();
        assert_eq!(sent.current_state, SupplyState::Send.as_u8());

        assert!(matches!(
            f.contract
                .change_status(&f.ctx(), &f.credentials, "aspirin", "00001", "lost"),
            Err(LedgerError::Validation(_))
        ));

        let moved = f
            .contract
            .change_holder(&f.ctx(), &f.credentials, "aspirin", "00001", "Clinic-7")
            .unwrap();
        assert_eq!(moved.holder, "clinic-7");
        assert_eq!(moved.current_state, SupplyState::Send.as_u8());

        assert!(matches!(
            f.contract
                .change_holder(&f.ctx(), &f.credentials, "aspirin", "00001", "   "),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_delete() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");

        f.contract
            .delete_medicine(&f.ctx(), &f.credentials, "aspirin", "00001")
            .unwrap();
        assert!(matches!(
            f.contract.get_medicine(&f.ctx(), "aspirin", "00001"),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            f.contract
                .delete_medicine(&f.ctx(), &f.credentials, "aspirin", "00001"),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_init_ledger() {
        let f = Fixture::new();
        let seeded = f.contract.init_ledger(&f.ctx(), &f.credentials).unwrap();
        assert_eq!(seeded.len(), 11);

        let available = f.contract.check_available(&f.ctx()).unwrap();
        assert_eq!(available.len(), 11);
        assert!(available.iter().all(|r| r.holder == "medstore"));

        let ibuprofen = f.contract.get_medicine(&f.ctx(), "Ibuprofen", "00011").unwrap();
        assert_eq!(ibuprofen.disease, "Fever");
        assert!(f.contract.verify_checksum(&f.ctx(), "ibuprofen", "00011").unwrap());
    }

    #[test]
    fn test_verify_checksum_detects_tampering() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        assert!(f.contract.verify_checksum(&f.ctx(), "aspirin", "00001").unwrap());

        let key = "org.medstore.medicalsupplylist:aspirin:00001";
        let mut record: MedicalSupplyRecord =
            serde_json::from_slice(&f.ledger.get_state(key).unwrap().unwrap()).unwrap();
        record.price = "$1".to_string();
        f.ledger
            .put_state(key, &serde_json::to_vec(&record).unwrap())
            .unwrap();
        assert!(!f.contract.verify_checksum(&f.ctx(), "aspirin", "00001").unwrap());

        record.checksum = None;
        f.ledger
            .put_state(key, &serde_json::to_vec(&record).unwrap())
            .unwrap();
        assert!(!f.contract.verify_checksum(&f.ctx(), "aspirin", "00001").unwrap());
    }

    #[test]
    fn test_enrollment_is_exactly_once() {
        let f = Fixture::new();
        assert!(matches!(
            f.contract.enroll_device(&f.ctx(), "Regulator"),
            Err(LedgerError::AlreadyExists(_))
        ));
        // The original key still works
        f.contract.check_history(&f.ctx(), &f.credentials).unwrap();
        assert!(f.contract.is_enrolled(&f.ctx(), "regulator").unwrap());
        assert!(!f.contract.is_enrolled(&f.ctx(), "alice").unwrap());
    }

    #[test]
    fn test_corrupt_record_surfaces_in_listing() {
        let f = Fixture::new();
        f.issue("aspirin", "00001");
        f.ledger
            .put_state("org.medstore.medicalsupplylist:aspirin:00002", b"{broken")
            .unwrap();

        assert!(matches!(
            f.contract.check_available(&f.ctx()),
            Err(LedgerError::Deserialization(_))
        ));
        assert_eq!(f.ledger.open_cursors(), 0);
    }

    #[test]
    fn test_rejects_delimiter_in_identifiers() {
        let f = Fixture::new();
        let result = f.contract.issue(
            &f.ctx(),
            &f.credentials,
            NewMedicine::new("aspirin:forte", "00001", "", "", ""),
        );
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(matches!(
            f.contract.request(&f.ctx(), "aspirin", "00001", "ali:ce"),
            Err(LedgerError::Validation(_))
        ));
    }
}
