//! The poll cycle: priority-ordered dequeue with cascading redistribution.

use tracing::{debug, error};

use crate::engine::allocator::{allocate, round_half_up};
use crate::engine::command::PollRequest;
use crate::engine::core::EngineCore;
use crate::engine::result::{BucketReport, PollResult, PollStats, PolledItem};
use crate::entry::QueueClass;
use crate::error::StorageResult;
use crate::limiter::GLOBAL_BUCKET;
use crate::storage::WriteBatchOp;

impl EngineCore {
    /// Execute one poll cycle. Always returns a result; storage failures in
    /// a step are logged and contribute zero items for that step.
    ///
    /// The whole cycle runs on the core thread, so each queue's select and
    /// remove are indivisible with respect to concurrent callers. Queues
    /// are visited in a fixed order and no lock spans two queues.
    pub(super) fn handle_poll(&mut self, req: &PollRequest) -> PollResult {
        if req.total_slots <= 0 {
            return PollResult::empty();
        }
        let total = req.total_slots as u64;
        let alloc = allocate(
            req.total_slots,
            req.order_weight,
            req.other_weight,
            req.retry_ratio,
        );

        let mut items: Vec<PolledItem> = Vec::new();

        // 1. ORDER retry: eligibility-filtered, oldest first.
        let order_retry = self.take(
            QueueClass::OrderRetry,
            alloc.order_retry,
            Some(req.retry_threshold_ms),
            &mut items,
        );

        // 2. ORDER normal: unused ORDER-retry slots roll forward.
        let order_normal = self.take(
            QueueClass::OrderNormal,
            alloc.order_normal + (alloc.order_retry - order_retry),
            None,
            &mut items,
        );

        // Slots the whole ORDER side could not use cascade to OTHER, split
        // by the retry ratio.
        let order_unused =
            (alloc.order_retry + alloc.order_normal) - (order_retry + order_normal);
        let retry_share = round_half_up(order_unused as f64 * req.retry_ratio.clamp(0.0, 1.0))
            .min(order_unused);

        // 3. OTHER retry: base quota plus its share of the ORDER leftovers.
        let other_retry_quota = alloc.other_retry + retry_share;
        let other_retry = self.take(
            QueueClass::OtherRetry,
            other_retry_quota,
            Some(req.retry_threshold_ms),
            &mut items,
        );

        // 4. OTHER normal: base quota, the OTHER-retry leftover, and the
        // non-retry share of the ORDER leftovers.
        let other_normal_quota =
            alloc.other_normal + (other_retry_quota - other_retry) + (order_unused - retry_share);
        let other_normal = self.take(QueueClass::OtherNormal, other_normal_quota, None, &mut items);

        let total_polled = order_retry + order_normal + other_retry + other_normal;
        debug_assert!(total_polled <= total, "poll overshot the requested total");

        let bucket = self.consume_tokens(total_polled, req);
        self.metrics
            .record_poll_cycle(bucket.tokens_consumed, bucket.water_level);

        PollResult {
            items,
            stats: PollStats {
                order_retry,
                order_normal,
                other_retry,
                other_normal,
                total_polled,
                remaining_slots: total - total_polled,
            },
            bucket,
        }
    }

    /// Dequeue up to `quota` entries from one queue, append them to the
    /// batch, and return the count actually taken. A storage failure polls
    /// zero from this queue; entries removed by earlier steps stay removed,
    /// since removal is not transactional across queues.
    fn take(
        &mut self,
        queue: QueueClass,
        quota: u64,
        max_score: Option<u64>,
        items: &mut Vec<PolledItem>,
    ) -> u64 {
        if quota == 0 {
            return 0;
        }
        match self.take_entries(queue, quota, max_score) {
            Ok(taken) => {
                let count = taken.len() as u64;
                self.depths[queue.idx()] = self.depths[queue.idx()].saturating_sub(count);
                self.metrics.record_polled(queue, count);
                items.extend(taken.into_iter().map(|entry| PolledItem {
                    queue,
                    data: entry.payload,
                    score: entry.score,
                }));
                count
            }
            Err(e) => {
                error!(
                    %queue, error = %e,
                    "poll step failed; queue contributes zero, prior removals stand"
                );
                0
            }
        }
    }

    /// Read then delete in one batch. The core thread is the only queue
    /// writer, so nothing can select these entries between the read and
    /// the delete; the batch keeps the removal all-or-nothing.
    fn take_entries(
        &self,
        queue: QueueClass,
        quota: u64,
        max_score: Option<u64>,
    ) -> StorageResult<Vec<crate::entry::QueueEntry>> {
        let listed = self.storage.list_entries(queue, quota as usize)?;

        let mut keys = Vec::new();
        let mut entries = Vec::new();
        for (key, entry) in listed {
            // Keys iterate in ascending score order; past the threshold
            // every remaining entry is ineligible too.
            if let Some(cap) = max_score {
                if entry.score > cap {
                    break;
                }
            }
            keys.push(key);
            entries.push(entry);
        }

        if !keys.is_empty() {
            self.storage.write_batch(
                keys.into_iter()
                    .map(|key| WriteBatchOp::DeleteEntry { key })
                    .collect(),
            )?;
        }
        Ok(entries)
    }

    /// Submit the polled-batch size to the shared bucket. The leak rate
    /// comes from the dynamic controller unless the request overrides it.
    fn consume_tokens(&self, total_polled: u64, req: &PollRequest) -> BucketReport {
        let leak_rate = req.leak_rate.unwrap_or(self.global_limit.get() as f64);
        let capacity = req.capacity.unwrap_or(self.bucket_config.capacity);

        match self
            .buckets
            .consume(GLOBAL_BUCKET, total_polled, req.now_ms, leak_rate, capacity)
        {
            Ok(receipt) => {
                debug!(
                    consumed = receipt.consumed,
                    water_level = receipt.water_level,
                    "bucket updated"
                );
                BucketReport {
                    water_level: receipt.water_level,
                    tokens_consumed: receipt.consumed,
                }
            }
            Err(e) => {
                error!(error = %e, "bucket store unavailable, reporting zero consumed");
                BucketReport::default()
            }
        }
    }
}
