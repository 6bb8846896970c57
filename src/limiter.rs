use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::bucket::BucketState;
use crate::clock;
use crate::error::StorageResult;
use crate::limit::DynamicLimit;
use crate::storage::Storage;

/// Name of the bucket shared by all queue classes.
pub const GLOBAL_BUCKET: &str = "global";

/// Outcome of a bucket consume: how many units were admitted and the
/// resulting water level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketReceipt {
    pub consumed: u64,
    pub water_level: f64,
}

/// Storage-backed bucket records, one serialization point per key.
///
/// The read-modify-write of a bucket (load, leak, consume, persist) runs
/// under that key's mutex, so two concurrent consumers can never both
/// observe a stale water level and jointly overshoot capacity. The poll
/// path and the limiter services share the same registry, which keeps the
/// global bucket consistent across both.
pub struct BucketRegistry {
    storage: Arc<dyn Storage>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Bucket records idle longer than this are re-initialized to empty on
    /// load. A fresh bucket starts empty, so dropping stale state fails
    /// open rather than closed.
    state_ttl_ms: u64,
}

impl BucketRegistry {
    pub fn new(storage: Arc<dyn Storage>, state_ttl_ms: u64) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
            state_ttl_ms,
        }
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    fn load(&self, name: &str, now_ms: u64) -> StorageResult<BucketState> {
        match self.storage.get_bucket(name)? {
            Some(state) if now_ms.saturating_sub(state.last_leak_ms) <= self.state_ttl_ms => {
                Ok(state)
            }
            _ => Ok(BucketState::empty(now_ms)),
        }
    }

    /// Atomically leak, consume up to `amount`, and persist the new state.
    pub fn consume(
        &self,
        name: &str,
        amount: u64,
        now_ms: u64,
        leak_rate: f64,
        capacity: f64,
    ) -> StorageResult<BucketReceipt> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut state = self.load(name, now_ms)?;
        let consumed = state.consume(amount, now_ms, leak_rate, capacity);
        self.storage.put_bucket(name, &state)?;

        Ok(BucketReceipt {
            consumed,
            water_level: state.water_level,
        })
    }

    /// Read the current water level with leak applied, without consuming.
    /// The decayed state is persisted so repeated peeks stay consistent.
    pub fn peek(&self, name: &str, now_ms: u64, leak_rate: f64) -> StorageResult<BucketState> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut state = self.load(name, now_ms)?;
        state.leak(now_ms, leak_rate);
        self.storage.put_bucket(name, &state)?;
        Ok(state)
    }
}

/// Service surface over one named bucket: the global limiter or one
/// provider-scoped limiter (e.g. TOSS). Structurally the same state
/// machine either way; only the key, capacity, and limit bounds differ.
pub struct BucketLimiter {
    name: String,
    buckets: Arc<BucketRegistry>,
    limit: Arc<DynamicLimit>,
    capacity: f64,
    /// Configured base rate, reported by `rate_limit()`.
    base_rate: i64,
}

impl BucketLimiter {
    /// The shared bucket: capacity 15, rate 15 within [10, 100].
    pub fn global(buckets: Arc<BucketRegistry>, limit: Arc<DynamicLimit>, capacity: f64) -> Self {
        let base_rate = limit.get();
        Self {
            name: GLOBAL_BUCKET.to_string(),
            buckets,
            limit,
            capacity,
            base_rate,
        }
    }

    /// A provider-scoped bucket with its own fixed capacity and bounds.
    pub fn provider(
        name: impl Into<String>,
        buckets: Arc<BucketRegistry>,
        capacity: f64,
        rate: i64,
        min_rate: i64,
        max_rate: i64,
    ) -> Self {
        Self {
            name: name.into(),
            buckets,
            limit: Arc::new(DynamicLimit::new(rate, min_rate, max_rate)),
            capacity,
            base_rate: rate,
        }
    }

    /// Try to admit one unit right now. Storage failures fail closed: the
    /// downstream system is protected at the cost of availability.
    pub fn try_consume(&self) -> bool {
        self.try_consume_at(clock::now_ms())
    }

    /// Deterministic variant with a caller-supplied clock.
    pub fn try_consume_at(&self, now_ms: u64) -> bool {
        match self
            .buckets
            .consume(&self.name, 1, now_ms, self.leak_rate(), self.capacity)
        {
            Ok(receipt) => receipt.consumed == 1,
            Err(e) => {
                warn!(limiter = %self.name, error = %e, "bucket store unavailable, denying");
                false
            }
        }
    }

    /// Integral headroom below capacity (`capacity - water_level`, floored).
    pub fn available_tokens(&self) -> i64 {
        self.available_tokens_at(clock::now_ms())
    }

    pub fn available_tokens_at(&self, now_ms: u64) -> i64 {
        match self.buckets.peek(&self.name, now_ms, self.leak_rate()) {
            Ok(state) => state.available(self.capacity) as i64,
            Err(e) => {
                warn!(limiter = %self.name, error = %e, "bucket store unavailable");
                0
            }
        }
    }

    /// Current water level, floored to a whole unit count.
    pub fn current_window_count(&self) -> i64 {
        self.current_window_count_at(clock::now_ms())
    }

    pub fn current_window_count_at(&self, now_ms: u64) -> i64 {
        match self.buckets.peek(&self.name, now_ms, self.leak_rate()) {
            Ok(state) => state.water_level.floor() as i64,
            Err(e) => {
                warn!(limiter = %self.name, error = %e, "bucket store unavailable");
                0
            }
        }
    }

    /// True once the bucket sits at or above 90% of capacity. Unknown
    /// state (store unavailable) reads as not saturated.
    pub fn is_token_saturated(&self) -> bool {
        self.is_token_saturated_at(clock::now_ms())
    }

    pub fn is_token_saturated_at(&self, now_ms: u64) -> bool {
        match self.buckets.peek(&self.name, now_ms, self.leak_rate()) {
            Ok(state) => state.is_saturated(self.capacity),
            Err(e) => {
                warn!(limiter = %self.name, error = %e, "bucket store unavailable");
                false
            }
        }
    }

    pub fn increase_limit(&self, delta: i64) -> i64 {
        self.limit.increase(delta)
    }

    pub fn decrease_limit(&self, delta: i64) -> i64 {
        self.limit.decrease(delta)
    }

    pub fn current_limit(&self) -> i64 {
        self.limit.get()
    }

    pub fn provider_name(&self) -> &str {
        &self.name
    }

    /// The configured base rate (not the dynamically adjusted one).
    pub fn rate_limit(&self) -> i64 {
        self.base_rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn leak_rate(&self) -> f64 {
        self.limit.get() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{QueueClass, QueueEntry};
    use crate::error::{StorageError, StorageResult};
    use crate::storage::{RocksDbStorage, WriteBatchOp};

    const TTL: u64 = 60_000;

    fn test_registry() -> (Arc<BucketRegistry>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(RocksDbStorage::open(dir.path()).unwrap());
        (Arc::new(BucketRegistry::new(storage, TTL)), dir)
    }

    fn toss(buckets: Arc<BucketRegistry>) -> BucketLimiter {
        BucketLimiter::provider("TOSS", buckets, 10.0, 10, 1, 100)
    }

    #[test]
    fn consume_persists_water_level() {
        let (registry, _dir) = test_registry();
        let r1 = registry.consume("global", 3, 1_000, 15.0, 15.0).unwrap();
        assert_eq!(r1.consumed, 3);
        assert_eq!(r1.water_level, 3.0);

        // Same instant: no leak, level accumulates
        let r2 = registry.consume("global", 4, 1_000, 15.0, 15.0).unwrap();
        assert_eq!(r2.consumed, 4);
        assert_eq!(r2.water_level, 7.0);
    }

    #[test]
    fn stale_state_resets_to_empty() {
        let (registry, _dir) = test_registry();
        registry.consume("global", 10, 1_000, 0.0, 15.0).unwrap();

        // Two minutes later, past the retention window, the bucket is fresh
        let state = registry.peek("global", 1_000 + TTL + 1, 0.0).unwrap();
        assert_eq!(state.water_level, 0.0);
    }

    #[test]
    fn state_within_ttl_is_kept() {
        let (registry, _dir) = test_registry();
        registry.consume("global", 10, 1_000, 0.0, 15.0).unwrap();
        let state = registry.peek("global", 1_000 + TTL, 0.0).unwrap();
        assert_eq!(state.water_level, 10.0);
    }

    #[test]
    fn independent_keys_do_not_share_levels() {
        let (registry, _dir) = test_registry();
        registry.consume("global", 15, 1_000, 0.0, 15.0).unwrap();
        let r = registry.consume("TOSS", 1, 1_000, 0.0, 10.0).unwrap();
        assert_eq!(r.consumed, 1);
    }

    #[test]
    fn concurrent_consumers_never_overshoot_capacity() {
        let (registry, _dir) = test_registry();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u64;
                for _ in 0..10 {
                    admitted += registry
                        .consume("global", 1, 1_000, 0.0, 15.0)
                        .unwrap()
                        .consumed;
                }
                admitted
            }));
        }
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 15, "80 attempts at capacity 15 must admit exactly 15");
    }

    #[test]
    fn provider_limiter_admits_up_to_capacity() {
        let (registry, _dir) = test_registry();
        let limiter = toss(registry);
        for _ in 0..10 {
            assert!(limiter.try_consume_at(1_000));
        }
        assert!(!limiter.try_consume_at(1_000), "11th unit must be denied");
    }

    #[test]
    fn available_and_window_count_track_the_level() {
        let (registry, _dir) = test_registry();
        let limiter = toss(registry);
        for _ in 0..3 {
            assert!(limiter.try_consume_at(1_000));
        }
        assert_eq!(limiter.available_tokens_at(1_000), 7);
        assert_eq!(limiter.current_window_count_at(1_000), 3);
    }

    #[test]
    fn saturation_at_ninety_percent() {
        let (registry, _dir) = test_registry();
        let limiter = toss(registry);
        for _ in 0..8 {
            limiter.try_consume_at(1_000);
        }
        assert!(!limiter.is_token_saturated_at(1_000)); // 80%
        limiter.try_consume_at(1_000);
        assert!(limiter.is_token_saturated_at(1_000)); // 90%
    }

    #[test]
    fn limit_adjustment_clamps_at_bounds() {
        let (registry, _dir) = test_registry();
        let global = BucketLimiter::global(
            registry,
            Arc::new(DynamicLimit::new(15, 10, 100)),
            15.0,
        );
        assert_eq!(global.current_limit(), 15);
        assert_eq!(global.increase_limit(200), 100);
        assert_eq!(global.decrease_limit(100), 10);
    }

    #[test]
    fn provider_metadata() {
        let (registry, _dir) = test_registry();
        let limiter = toss(registry);
        assert_eq!(limiter.provider_name(), "TOSS");
        assert_eq!(limiter.rate_limit(), 10);
        assert_eq!(limiter.capacity(), 10.0);
    }

    /// Storage stub whose every operation fails, for exercising the
    /// fail-closed path.
    struct FailingStorage;

    impl crate::storage::Storage for FailingStorage {
        fn put_entry(&self, _: &[u8], _: &QueueEntry) -> StorageResult<()> {
            Err(StorageError::RocksDb("store down".into()))
        }
        fn list_entries(
            &self,
            _: QueueClass,
            _: usize,
        ) -> StorageResult<Vec<(Vec<u8>, QueueEntry)>> {
            Err(StorageError::RocksDb("store down".into()))
        }
        fn count_entries(&self, _: QueueClass) -> StorageResult<u64> {
            Err(StorageError::RocksDb("store down".into()))
        }
        fn put_bucket(&self, _: &str, _: &crate::bucket::BucketState) -> StorageResult<()> {
            Err(StorageError::RocksDb("store down".into()))
        }
        fn get_bucket(&self, _: &str) -> StorageResult<Option<crate::bucket::BucketState>> {
            Err(StorageError::RocksDb("store down".into()))
        }
        fn write_batch(&self, _: Vec<WriteBatchOp>) -> StorageResult<()> {
            Err(StorageError::RocksDb("store down".into()))
        }
        fn flush(&self) -> StorageResult<()> {
            Err(StorageError::RocksDb("store down".into()))
        }
    }

    #[test]
    fn store_outage_fails_closed() {
        let registry = Arc::new(BucketRegistry::new(Arc::new(FailingStorage), TTL));
        let limiter = toss(registry);
        assert!(!limiter.try_consume(), "outage must deny, not allow");
        assert_eq!(limiter.available_tokens(), 0);
        assert!(!limiter.is_token_saturated());
    }
}
