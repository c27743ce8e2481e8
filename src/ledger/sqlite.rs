use crate::error::LedgerError;
use crate::ledger::{LedgerCursor, LedgerEntry, LedgerStub, VecCursor};
use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::runtime::Runtime;

/// World state persisted in a single SQLite table, accessed through sqlx.
///
/// The ledger interface is synchronous, so the store drives its own
/// current-thread runtime and blocks on each query.
pub struct SqliteLedger {
    pool: SqlitePool,
    rt: Arc<Runtime>,
    db_path: PathBuf,
}

impl SqliteLedger {
    /// Opens (creating if needed) a SQLite world state at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db_path = path.as_ref().to_path_buf();
        let db_url = format!("sqlite:{}", db_path.to_string_lossy());

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create runtime")?;
        let rt = Arc::new(rt);

        let options = SqliteConnectOptions::from_str(&db_url)
            .with_context(|| format!("Invalid database URL: {}", db_url))?
            .create_if_missing(true);

        let pool = rt
            .block_on(async {
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
            })
            .with_context(|| format!("Failed to connect to database at {:?}", db_path))?;

        rt.block_on(Self::initialize_schema(&pool))
            .context("Failed to initialize database schema")?;

        log::debug!("Opened SQLite world state at {:?}", db_path);

        Ok(Self { pool, rt, db_path })
    }

    /// Creates the world-state table
    async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS world_state (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl LedgerStub for SqliteLedger {
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.rt
            .block_on(async {
                sqlx::query(
                    "INSERT INTO world_state (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await
            })
            .with_context(|| format!("Failed to store key {}", key))?;
        Ok(())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let row = self
            .rt
            .block_on(async {
                sqlx::query("SELECT value FROM world_state WHERE key = ?1")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await
            })
            .with_context(|| format!("Failed to read key {}", key))?;

        match row {
            Some(row) => {
                let value: Vec<u8> = row.try_get("value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete_state(&self, key: &str) -> Result<(), LedgerError> {
        self.rt
            .block_on(async {
                sqlx::query("DELETE FROM world_state WHERE key = ?1")
                    .bind(key)
                    .execute(&self.pool)
                    .await
            })
            .with_context(|| format!("Failed to delete key {}", key))?;
        Ok(())
    }

    fn range_scan(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Box<dyn LedgerCursor + '_>, LedgerError> {
        // Keys are compared with SQLite's BINARY collation, i.e. byte order
        let rows = self
            .rt
            .block_on(async {
                sqlx::query(
                    "SELECT key, value FROM world_state
                     WHERE key >= ?1 AND key < ?2
                     ORDER BY key",
                )
                .bind(start_key)
                .bind(end_key)
                .fetch_all(&self.pool)
                .await
            })
            .with_context(|| format!("Failed to scan range [{}, {})", start_key, end_key))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LedgerEntry {
                key: row.try_get("key")?,
                value: row.try_get("value")?,
            });
        }

        Ok(Box::new(VecCursor::new(entries)))
    }
}

impl Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_basic_storage_operations() {
        let temp_dir = tempdir().unwrap();
        let ledger = SqliteLedger::new(temp_dir.path().join("world_state.db")).unwrap();

        ledger.put_state("ns:aspirin:00001", b"first").unwrap();
        assert_eq!(
            ledger.get_state("ns:aspirin:00001").unwrap(),
            Some(b"first".to_vec())
        );

        ledger.put_state("ns:aspirin:00001", b"second").unwrap();
        assert_eq!(
            ledger.get_state("ns:aspirin:00001").unwrap(),
            Some(b"second".to_vec())
        );

        ledger.delete_state("ns:aspirin:00001").unwrap();
        assert_eq!(ledger.get_state("ns:aspirin:00001").unwrap(), None);
        ledger.delete_state("ns:aspirin:00001").unwrap();
    }

    #[test]
    fn test_prefix_scan() {
        let temp_dir = tempdir().unwrap();
        let ledger = SqliteLedger::new(temp_dir.path().join("scan.db")).unwrap();

        ledger.put_state("ns:vicodin:00002", b"v").unwrap();
        ledger.put_state("ns:aspirin:00003", b"a3").unwrap();
        ledger.put_state("ns:aspirin:00001", b"a1").unwrap();
        ledger.put_state("ns:aspirinx:00001", b"x").unwrap();

        let keys: Vec<String> = ledger
            .prefix_scan("ns", &["aspirin"])
            .unwrap()
            .map(|entry| entry.unwrap().key)
            .collect();
        assert_eq!(keys, vec!["ns:aspirin:00001", "ns:aspirin:00003"]);

        let all: Vec<String> = ledger
            .prefix_scan("ns", &[])
            .unwrap()
            .map(|entry| entry.unwrap().key)
            .collect();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_reopen_keeps_state() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("persist.db");
        {
            let ledger = SqliteLedger::new(&path).unwrap();
            ledger.put_state("ns:k", b"kept").unwrap();
        }
        let ledger = SqliteLedger::new(&path).unwrap();
        assert_eq!(ledger.get_state("ns:k").unwrap(), Some(b"kept".to_vec()));
    }
}
