use crate::error::LedgerError;
use crate::ledger::{LedgerCursor, LedgerEntry, LedgerStub};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-process world state kept in key order.
///
/// Used for tests and for embedding the engine without an external ledger.
/// Scans are snapshot reads taken when the cursor is opened.
pub struct MemoryLedger {
    state: RwLock<BTreeMap<String, Vec<u8>>>,
    open_cursors: Arc<AtomicUsize>,
    unavailable: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BTreeMap::new()),
            open_cursors: Arc::new(AtomicUsize::new(0)),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of cursors handed out and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of keys currently stored
    pub fn len(&self) -> Result<usize, LedgerError> {
        let state = self
            .state
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(state.len())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    /// Make every subsequent call fail as if the ledger peer could not be reached
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("ledger peer unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("keys", &self.len().ok())
            .field("open_cursors", &self.open_cursors())
            .finish()
    }
}

// Decrements the open-cursor count however the cursor goes away
struct CursorGuard(Arc<AtomicUsize>);

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot cursor over a key range of a [`MemoryLedger`]
pub struct MemoryCursor {
    entries: std::vec::IntoIter<LedgerEntry>,
    _guard: CursorGuard,
}

impl Iterator for MemoryCursor {
    type Item = Result<LedgerEntry, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}

impl LedgerCursor for MemoryCursor {}

impl LedgerStub for MemoryLedger {
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut state = self
            .state
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        state.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.check_available()?;
        let state = self
            .state
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(state.get(key).cloned())
    }

    fn delete_state(&self, key: &str) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut state = self
            .state
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        state.remove(key);
        Ok(())
    }

    fn range_scan(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Box<dyn LedgerCursor + '_>, LedgerError> {
        self.check_available()?;
        if start_key > end_key {
            return Err(LedgerError::Validation(format!(
                "range start {:?} is past range end {:?}",
                start_key, end_key
            )));
        }

        let state = self
            .state
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let entries: Vec<LedgerEntry> = state
            .range(start_key.to_string()..end_key.to_string())
            .map(|(key, value)| LedgerEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryCursor {
            entries: entries.into_iter(),
            _guard: CursorGuard(self.open_cursors.clone()),
        }))
    }
}
