use serde::Serialize;

use crate::entry::QueueClass;

/// One dequeued entry, tagged with its source queue.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PolledItem {
    pub queue: QueueClass,
    pub data: String,
    pub score: u64,
}

/// Per-queue counts for one poll cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PollStats {
    pub order_retry: u64,
    pub order_normal: u64,
    pub other_retry: u64,
    pub other_normal: u64,
    pub total_polled: u64,
    pub remaining_slots: u64,
}

/// Bucket outcome reported alongside the batch.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct BucketReport {
    pub water_level: f64,
    pub tokens_consumed: u64,
}

/// The result of one poll cycle. Field names are part of the wire contract
/// consumed by the dispatcher; do not rename.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PollResult {
    pub items: Vec<PolledItem>,
    pub stats: PollStats,
    pub bucket: BucketReport,
}

/// Fixed fallback payload, syntactically identical to a serialized empty
/// result. Returned instead of an error when encoding fails.
const EMPTY_RESULT_JSON: &str = concat!(
    r#"{"items":[],"#,
    r#""stats":{"order_retry":0,"order_normal":0,"other_retry":0,"other_normal":0,"#,
    r#""total_polled":0,"remaining_slots":0},"#,
    r#""bucket":{"water_level":0.0,"tokens_consumed":0}}"#
);

impl PollResult {
    /// The defined no-op result (`total_slots <= 0`, or nothing polled).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encode for the wire. A serialization failure degrades to the fixed
    /// empty payload rather than failing the caller.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| EMPTY_RESULT_JSON.to_string())
    }
}
