use crate::engine::config::PollConfig;
use crate::engine::result::PollResult;
use crate::entry::QueueClass;
use crate::error::StorageError;

/// Inputs for one poll cycle. Weights, ratio, and thresholds are explicit
/// per-call parameters; `PollRequest::with_config` fills them from the
/// documented defaults.
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub now_ms: u64,
    /// Requested capacity for this cycle. `<= 0` is a defined no-op.
    pub total_slots: i64,
    pub order_weight: f64,
    pub other_weight: f64,
    pub retry_ratio: f64,
    /// Retry entries with `score <= retry_threshold_ms` are eligible.
    pub retry_threshold_ms: u64,
    /// Overrides the dynamic controller's current rate when set.
    pub leak_rate: Option<f64>,
    /// Overrides the configured bucket capacity when set.
    pub capacity: Option<f64>,
}

impl PollRequest {
    /// Build a request from the configured defaults. The retry threshold is
    /// derived from `now - retry_window_ms`.
    pub fn with_config(now_ms: u64, total_slots: i64, config: &PollConfig) -> Self {
        Self {
            now_ms,
            total_slots,
            order_weight: config.order_weight,
            other_weight: config.other_weight,
            retry_ratio: config.retry_ratio,
            retry_threshold_ms: now_ms.saturating_sub(config.retry_window_ms),
            leak_rate: None,
            capacity: None,
        }
    }
}

/// Commands sent from caller threads to the single-threaded engine core.
///
/// Each variant that expects a response includes a `tokio::sync::oneshot::Sender`
/// for the reply.
pub enum EngineCommand {
    Enqueue {
        queue: QueueClass,
        payload: String,
        score: u64,
        /// Replies with the queue depth after insert (1-based position).
        reply: tokio::sync::oneshot::Sender<Result<u64, StorageError>>,
    },
    Poll {
        request: PollRequest,
        reply: tokio::sync::oneshot::Sender<PollResult>,
    },
    Depth {
        queue: QueueClass,
        reply: tokio::sync::oneshot::Sender<u64>,
    },
    Shutdown,
}
