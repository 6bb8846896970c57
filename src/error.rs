/// Low-level storage errors (RocksDB, serialization).
/// This is the error type for the `Storage` trait; storage operations can only
/// fail with infrastructure errors, never domain errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("rocksdb error: {0}")]
    RocksDb(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDb(err.into_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the `Engine` handle (command channel and core thread).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine command channel is full")]
    ChannelFull,

    #[error("engine command channel is disconnected")]
    ChannelDisconnected,

    #[error("failed to spawn engine core thread: {0}")]
    CoreSpawn(String),

    #[error("engine core thread panicked")]
    CorePanicked,

    #[error("engine core dropped the reply channel")]
    ReplyDropped,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from loading configuration off disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
