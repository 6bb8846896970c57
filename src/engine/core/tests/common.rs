use super::*;

pub(super) fn test_setup() -> (
    crossbeam_channel::Sender<EngineCommand>,
    EngineCore,
    tempfile::TempDir,
) {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RocksDbStorage::open(dir.path()).unwrap());
    let (tx, core) = test_setup_with_storage(storage);
    (tx, core, dir)
}

/// Helper: create a core sharing an existing storage (for restart tests).
pub(super) fn test_setup_with_storage(
    storage: Arc<dyn Storage>,
) -> (crossbeam_channel::Sender<EngineCommand>, EngineCore) {
    let core_config = CoreConfig {
        command_channel_capacity: 256,
        idle_timeout_ms: 10,
    };
    let bucket_config = BucketConfig::default();
    let (tx, rx) = crossbeam_channel::bounded(core_config.command_channel_capacity);
    let buckets = Arc::new(BucketRegistry::new(
        Arc::clone(&storage),
        bucket_config.state_ttl_ms,
    ));
    let limit = Arc::new(DynamicLimit::new(
        bucket_config.initial_rate,
        bucket_config.min_rate,
        bucket_config.max_rate,
    ));
    let core = EngineCore::new(storage, rx, buckets, limit, &core_config, &bucket_config);
    (tx, core)
}

/// Helper: enqueue one entry directly through the handler and return the
/// reported depth.
pub(super) fn enqueue_one(core: &mut EngineCore, queue: QueueClass, payload: &str, score: u64) -> u64 {
    core.handle_enqueue(queue, payload.to_string(), score)
        .unwrap()
}

/// Helper: enqueue `count` entries with consecutive scores starting at
/// `first_score`.
pub(super) fn fill_queue(core: &mut EngineCore, queue: QueueClass, first_score: u64, count: u64) {
    for i in 0..count {
        enqueue_one(core, queue, &format!("{queue}-{i}"), first_score + i);
    }
}

/// Helper: a poll request with the documented defaults (weights 7/3, ratio
/// 0.7, four-second retry window) and a fixed clock.
pub(super) fn poll_request(now_ms: u64, total_slots: i64) -> PollRequest {
    PollRequest {
        now_ms,
        total_slots,
        order_weight: 7.0,
        other_weight: 3.0,
        retry_ratio: 0.7,
        retry_threshold_ms: now_ms.saturating_sub(4_000),
        leak_rate: None,
        capacity: None,
    }
}
