use std::path::Path;

use rocksdb::{
    ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded, Options, WriteBatch,
};

use crate::bucket::BucketState;
use crate::entry::{QueueClass, QueueEntry};
use crate::error::{StorageError, StorageResult};
use crate::storage::keys;
use crate::storage::traits::{Storage, WriteBatchOp};

const CF_ENTRIES: &str = "entries";
const CF_BUCKETS: &str = "buckets";

/// All column family names (excluding `default` which RocksDB creates automatically).
const COLUMN_FAMILIES: &[&str] = &[CF_ENTRIES, CF_BUCKETS];

type DB = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed storage implementation.
pub struct RocksDbStorage {
    db: DB,
}

impl RocksDbStorage {
    /// Open or create a RocksDB database at the given path with all column families.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> StorageResult<std::sync::Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::RocksDb(format!("column family not found: {name}")))
    }
}

impl Storage for RocksDbStorage {
    fn put_entry(&self, key: &[u8], entry: &QueueEntry) -> StorageResult<()> {
        let cf = self.cf(CF_ENTRIES)?;
        let value = serde_json::to_vec(entry)?;
        self.db.put_cf(&cf, key, &value)?;
        Ok(())
    }

    fn list_entries(
        &self,
        queue: QueueClass,
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, QueueEntry)>> {
        let cf = self.cf(CF_ENTRIES)?;
        let prefix = keys::queue_prefix(queue);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward));
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) || results.len() >= limit {
                break;
            }
            let entry: QueueEntry = serde_json::from_slice(&value)?;
            results.push((key.to_vec(), entry));
        }
        Ok(results)
    }

    fn count_entries(&self, queue: QueueClass) -> StorageResult<u64> {
        let cf = self.cf(CF_ENTRIES)?;
        let prefix = keys::queue_prefix(queue);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward));
        let mut count = 0;
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn put_bucket(&self, name: &str, state: &BucketState) -> StorageResult<()> {
        let cf = self.cf(CF_BUCKETS)?;
        let value = serde_json::to_vec(state)?;
        self.db.put_cf(&cf, name.as_bytes(), &value)?;
        Ok(())
    }

    fn get_bucket(&self, name: &str) -> StorageResult<Option<BucketState>> {
        let cf = self.cf(CF_BUCKETS)?;
        match self.db.get_cf(&cf, name.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        let mut batch = WriteBatch::default();

        for op in ops {
            match op {
                WriteBatchOp::PutEntry { key, value } => {
                    batch.put_cf(&self.cf(CF_ENTRIES)?, &key, &value);
                }
                WriteBatchOp::DeleteEntry { key } => {
                    batch.delete_cf(&self.cf(CF_ENTRIES)?, &key);
                }
                WriteBatchOp::PutBucket { key, value } => {
                    batch.put_cf(&self.cf(CF_BUCKETS)?, &key, &value);
                }
                WriteBatchOp::DeleteBucket { key } => {
                    batch.delete_cf(&self.cf(CF_BUCKETS)?, &key);
                }
            }
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
