use crate::error::LedgerError;
use crate::ledger::{LedgerCursor, LedgerEntry, LedgerStub};
use ::rocksdb::{ColumnFamilyDescriptor, DBIteratorWithThreadMode, Direction, IteratorMode, Options, DB};
use anyhow::Context;
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

// Column family holding the world state
const CF_WORLD_STATE: &str = "world_state";

/// RocksDB implementation of the ledger world state
pub struct RocksDbLedger {
    db: Arc<DB>,
    db_path: PathBuf,
}

impl RocksDbLedger {
    /// Opens (creating if needed) a RocksDB world state at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db_path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_world_state = ColumnFamilyDescriptor::new(CF_WORLD_STATE, Options::default());
        let db = DB::open_cf_descriptors(&opts, &db_path, vec![cf_world_state])
            .with_context(|| format!("Failed to open RocksDB database at {:?}", db_path))?;

        log::debug!("Opened RocksDB world state at {:?}", db_path);

        Ok(Self {
            db: Arc::new(db),
            db_path,
        })
    }

    fn cf(&self) -> Result<&::rocksdb::ColumnFamily, LedgerError> {
        self.db.cf_handle(CF_WORLD_STATE).ok_or_else(|| {
            LedgerError::Storage("World state column family not found".to_string())
        })
    }
}

/// Forward cursor over a RocksDB key range; the underlying iterator is released on drop
pub struct RocksDbCursor<'a> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    end_key: Vec<u8>,
    done: bool,
}

impl Iterator for RocksDbCursor<'_> {
    type Item = Result<LedgerEntry, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.inner.next() {
            None => {
                self.done = true;
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(LedgerError::from(e)))
            }
            Some(Ok((key, value))) => {
                if &key[..] >= self.end_key.as_slice() {
                    self.done = true;
                    return None;
                }
                let key = match String::from_utf8(key.into_vec()) {
                    Ok(key) => key,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(LedgerError::Storage(format!(
                            "Stored key is not valid UTF-8: {}",
                            e
                        ))));
                    }
                };
                Some(Ok(LedgerEntry {
                    key,
                    value: value.into_vec(),
                }))
            }
        }
    }
}

impl LedgerCursor for RocksDbCursor<'_> {}

impl LedgerStub for RocksDbLedger {
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        let cf = self.cf()?;
        self.db
            .put_cf(cf, key.as_bytes(), value)
            .with_context(|| format!("Failed to store key {}", key))?;
        Ok(())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let cf = self.cf()?;
        let value = self
            .db
            .get_cf(cf, key.as_bytes())
            .with_context(|| format!("Failed to read key {}", key))?;
        Ok(value)
    }

    fn delete_state(&self, key: &str) -> Result<(), LedgerError> {
        let cf = self.cf()?;
        self.db
            .delete_cf(cf, key.as_bytes())
            .with_context(|| format!("Failed to delete key {}", key))?;
        Ok(())
    }

    fn range_scan(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Box<dyn LedgerCursor + '_>, LedgerError> {
        let cf = self.cf()?;
        let inner = self
            .db
            .iterator_cf(cf, IteratorMode::From(start_key.as_bytes(), Direction::Forward));
        Ok(Box::new(RocksDbCursor {
            inner,
            end_key: end_key.as_bytes().to_vec(),
            done: false,
        }))
    }
}

impl Debug for RocksDbLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbLedger")
            .field("db_path", &self.db_path)
            .finish()
    }
}
