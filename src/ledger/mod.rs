//! World-state access consumed by the engine.
//!
//! The distributed ledger itself (consensus, block production, replication) lives
//! outside this crate. The engine only needs ordinary key-value reads and writes plus
//! ordered range scans, expressed by [`LedgerStub`]. Every contract invocation runs
//! against one [`TransactionContext`], which also answers who the caller is.

use crate::error::LedgerError;
use crate::key::prefix_range;

pub mod memory;
pub use memory::MemoryLedger;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;

#[cfg(feature = "rocksdb")]
pub mod rocksdb;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::RocksDbLedger;

/// A raw key/value pair produced by a ledger cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Forward-only cursor over a key range, in the ledger's native (lexicographic) key order.
///
/// Implementations release whatever they hold when dropped, so a cursor abandoned
/// half-way through is cleaned up the same way as an exhausted one.
pub trait LedgerCursor: Iterator<Item = Result<LedgerEntry, LedgerError>> {}

/// Key-value interface of the ledger's world state
pub trait LedgerStub {
    /// Store `value` under `key`, replacing any previous value
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError>;

    /// Read the value stored under `key`
    ///
    /// # Returns
    /// `Some(bytes)` if a value exists, `None` otherwise
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Remove the value stored under `key`. Removing an absent key is not an error.
    fn delete_state(&self, key: &str) -> Result<(), LedgerError>;

    /// Open a cursor over every key in `[start_key, end_key)`
    fn range_scan(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Box<dyn LedgerCursor + '_>, LedgerError>;

    /// Open a cursor over every key in `namespace` whose leading components equal `parts`
    fn prefix_scan(
        &self,
        namespace: &str,
        parts: &[&str],
    ) -> Result<Box<dyn LedgerCursor + '_>, LedgerError> {
        let (start, end) = prefix_range(namespace, parts);
        self.range_scan(&start, &end)
    }
}

/// Everything a single contract invocation can see
pub trait TransactionContext {
    /// The world state this invocation reads and writes
    fn ledger(&self) -> &dyn LedgerStub;

    /// Organization of the identity that submitted the invocation
    fn caller_organization(&self) -> Result<String, LedgerError>;
}

/// Plain transaction context: a ledger handle plus the caller's organization id
pub struct Transaction<'a> {
    ledger: &'a dyn LedgerStub,
    organization: String,
}

impl<'a> Transaction<'a> {
    pub fn new(ledger: &'a dyn LedgerStub, organization: impl Into<String>) -> Self {
        Self {
            ledger,
            organization: organization.into(),
        }
    }
}

impl TransactionContext for Transaction<'_> {
    fn ledger(&self) -> &dyn LedgerStub {
        self.ledger
    }

    fn caller_organization(&self) -> Result<String, LedgerError> {
        Ok(self.organization.clone())
    }
}

/// Cursor over entries that were already materialized by the backend
pub struct VecCursor {
    entries: std::vec::IntoIter<LedgerEntry>,
}

impl VecCursor {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for VecCursor {
    type Item = Result<LedgerEntry, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}

impl LedgerCursor for VecCursor {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix_scan_is_component_exact() {
        let ledger = MemoryLedger::new();
        ledger.put_state("ns:aspirin:00001", b"a1").unwrap();
        ledger.put_state("ns:aspirin:00002", b"a2").unwrap();
        ledger.put_state("ns:aspirinplus:00001", b"ap").unwrap();
        ledger.put_state("other:aspirin:00003", b"o").unwrap();

        let keys: Vec<String> = ledger
            .prefix_scan("ns", &["aspirin"])
            .unwrap()
            .map(|entry| entry.unwrap().key)
            .collect();
        assert_eq!(keys, vec!["ns:aspirin:00001", "ns:aspirin:00002"]);
    }

    #[test]
    fn test_transaction_context() {
        let ledger = MemoryLedger::new();
        let ctx = Transaction::new(&ledger, "RegulatorsMSP");
        assert_eq!(ctx.caller_organization().unwrap(), "RegulatorsMSP");
        ctx.ledger().put_state("k", b"v").unwrap();
        assert_eq!(ledger.get_state("k").unwrap(), Some(b"v".to_vec()));
    }
}
