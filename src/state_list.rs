//! Typed persistence over the ledger's key-value world state.
//!
//! A [`StateList`] owns the mapping between an entity kind and its ledger keys:
//! every entity of the kind lives under `namespace:part1:part2..`, where the
//! parts come from [`LedgerState::split_key`]. The same list type serves every
//! entity kind; only the namespace and the entity's codec differ.

use std::marker::PhantomData;

use crate::error::LedgerError;
use crate::key::{namespaced_key, validate_part};
use crate::ledger::{LedgerCursor, LedgerStub};

/// Capabilities an entity needs to be kept in a [`StateList`]
pub trait LedgerState: Sized {
    /// Components that, in order, form the entity's key within its namespace
    fn split_key(&self) -> Vec<String>;

    /// Encode the entity for storage
    fn to_bytes(&self) -> Result<Vec<u8>, LedgerError>;

    /// Decode an entity previously written by [`LedgerState::to_bytes`]
    fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError>;
}

/// CRUD and scans for one entity kind
pub struct StateList<'a, E> {
    ledger: &'a dyn LedgerStub,
    namespace: String,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: LedgerState> StateList<'a, E> {
    pub fn new(ledger: &'a dyn LedgerStub, namespace: impl Into<String>) -> Self {
        Self {
            ledger,
            namespace: namespace.into(),
            _entity: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn ledger_key<S: AsRef<str>>(&self, parts: &[S]) -> Result<String, LedgerError> {
        if parts.is_empty() {
            return Err(LedgerError::Validation("entity key has no parts".to_string()));
        }
        for part in parts {
            validate_part(part.as_ref())?;
        }
        Ok(namespaced_key(&self.namespace, parts))
    }

    /// Write an entity under the key built from its split-key parts
    pub fn add(&self, entity: &E) -> Result<(), LedgerError> {
        let key = self.ledger_key(&entity.split_key())?;
        let data = entity.to_bytes()?;
        log::debug!("put {} ({} bytes)", key, data.len());
        self.ledger.put_state(&key, &data)
    }

    /// Same as [`StateList::add`]; kept separate so call sites read as updates
    pub fn update(&self, entity: &E) -> Result<(), LedgerError> {
        self.add(entity)
    }

    /// Load the entity stored under `key_parts`
    ///
    /// # Returns
    /// `NotFound` if nothing is stored there, `Deserialization` if the stored bytes are corrupt
    pub fn get(&self, key_parts: &[&str]) -> Result<E, LedgerError> {
        self.try_get(key_parts)?
            .ok_or_else(|| LedgerError::NotFound(format!("no state found for {}", key_parts.join(":"))))
    }

    /// Like [`StateList::get`] but reports absence as `None`
    pub fn try_get(&self, key_parts: &[&str]) -> Result<Option<E>, LedgerError> {
        let key = self.ledger_key(key_parts)?;
        log::debug!("get {}", key);
        match self.ledger.get_state(&key)? {
            Some(data) => E::from_bytes(&data).map(Some),
            None => Ok(None),
        }
    }

    /// Whether anything is stored under `key_parts`, without decoding it
    pub fn exists(&self, key_parts: &[&str]) -> Result<bool, LedgerError> {
        let key = self.ledger_key(key_parts)?;
        Ok(self.ledger.get_state(&key)?.is_some())
    }

    /// Remove the entry under `key_parts`. Absent keys are not an error.
    pub fn delete(&self, key_parts: &[&str]) -> Result<(), LedgerError> {
        let key = self.ledger_key(key_parts)?;
        log::debug!("delete {}", key);
        self.ledger.delete_state(&key)
    }

    /// Every entity of this kind, in key order
    pub fn scan_all(&self) -> Result<StateIter<'a, E>, LedgerError> {
        self.scan_by_prefix(&[])
    }

    /// Entities whose leading key parts equal `prefix_parts`, in key order
    pub fn scan_by_prefix(&self, prefix_parts: &[&str]) -> Result<StateIter<'a, E>, LedgerError> {
        for part in prefix_parts {
            validate_part(part)?;
        }
        let ledger: &'a dyn LedgerStub = self.ledger;
        log::debug!("scan {} prefix {:?}", self.namespace, prefix_parts);
        let cursor = ledger.prefix_scan(&self.namespace, prefix_parts)?;
        Ok(StateIter {
            cursor: Some(cursor),
            _entity: PhantomData,
        })
    }
}

/// Lazy, forward-only sequence of decoded entities.
///
/// The first error ends the sequence: a record that fails to decode is reported,
/// never skipped. The underlying cursor is dropped as soon as the sequence ends,
/// and in any case when the iterator itself is dropped.
pub struct StateIter<'a, E> {
    cursor: Option<Box<dyn LedgerCursor + 'a>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: LedgerState> Iterator for StateIter<'_, E> {
    type Item = Result<E, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let item = match cursor.next() {
            None => None,
            Some(Err(e)) => Some(Err(e)),
            Some(Ok(entry)) => match E::from_bytes(&entry.value) {
                Ok(entity) => return Some(Ok(entity)),
                Err(e) => Some(Err(LedgerError::Deserialization(format!(
                    "record {}: {}",
                    entry.key, e
                )))),
            },
        };
        // Exhausted or failed: release the cursor now
        self.cursor = None;
        item
    }
}
