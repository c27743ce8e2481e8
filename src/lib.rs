pub mod authority;
pub mod config;
pub mod contract;
pub mod device_auth;
pub mod error;
pub mod hardware;
pub mod key;
pub mod ledger;
pub mod medicine;
pub mod state_list;

// Re-export the main types for convenience
pub use authority::{AuthorityGate, Credentials};
pub use config::EngineConfig;
pub use contract::MedicalSupplyContract;
pub use device_auth::{DeviceAuth, DeviceAuthRecord};
pub use error::LedgerError;
pub use hardware::{HardwarePrimitive, SoftwarePrimitive, UnavailablePrimitive};
pub use key::{make_key, split_key};
pub use ledger::{
    LedgerCursor,
    LedgerEntry,
    LedgerStub,
    MemoryLedger,
    Transaction,
    TransactionContext,
};
pub use medicine::{MedicalSupply, MedicalSupplyRecord, NewMedicine, SupplyState};
pub use state_list::{LedgerState, StateIter, StateList};

// Re-export the ledger backends
#[cfg(feature = "rocksdb")]
pub use ledger::RocksDbLedger;

#[cfg(feature = "sqlite")]
pub use ledger::SqliteLedger;
