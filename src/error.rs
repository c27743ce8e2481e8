use thiserror::Error;

/// Represents all possible errors that can occur while executing a supply-chain operation
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No value is stored under the requested key
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same key already exists (duplicate create or enrollment)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Bytes read back from the ledger could not be decoded into an entity
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An entity could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A lifecycle rule was violated; the entity was left untouched
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The authority gate rejected the caller
    #[error("Authorization failed")]
    Authorization,

    /// The ledger backend failed to carry out a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Caller supplied input that cannot be used (empty holder, unknown status, bad key part)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The hardware primitive failed and no fallback applies
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Deserialization(err.to_string())
    }
}

// Backends attach context with anyhow before handing errors back to the core
impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::Storage(format!("{:#}", err))
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}
