use crate::bucket::BucketState;
use crate::entry::{QueueClass, QueueEntry};
use crate::error::StorageResult;

/// Represents a single operation in an atomic write batch.
#[derive(Debug)]
pub enum WriteBatchOp {
    PutEntry { key: Vec<u8>, value: Vec<u8> },
    DeleteEntry { key: Vec<u8> },
    PutBucket { key: Vec<u8>, value: Vec<u8> },
    DeleteBucket { key: Vec<u8> },
}

/// Storage trait for all persistence operations. Implementations must be
/// thread-safe; serialization of read-modify-write sequences is the
/// caller's responsibility (engine core thread for entries, per-key mutex
/// for buckets).
pub trait Storage: Send + Sync {
    // --- Queue entry operations ---

    /// Store an entry in the entries CF.
    fn put_entry(&self, key: &[u8], entry: &QueueEntry) -> StorageResult<()>;

    /// List up to `limit` entries of a queue in key order (ascending score,
    /// payload tie-break). Returns (key, entry) pairs.
    fn list_entries(
        &self,
        queue: QueueClass,
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, QueueEntry)>>;

    /// Count all entries currently stored for a queue.
    fn count_entries(&self, queue: QueueClass) -> StorageResult<u64>;

    // --- Bucket operations ---

    /// Store a bucket record by name.
    fn put_bucket(&self, name: &str, state: &BucketState) -> StorageResult<()>;

    /// Retrieve a bucket record by name.
    fn get_bucket(&self, name: &str) -> StorageResult<Option<BucketState>>;

    // --- Batch operations ---

    /// Atomically apply a batch of write operations across column families.
    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()>;

    /// Flush pending writes to disk (called on shutdown).
    fn flush(&self) -> StorageResult<()>;
}
