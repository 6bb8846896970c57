use serde::{Deserialize, Serialize};

/// The four admission queues, in strict poll priority order.
///
/// ORDER traffic always outranks OTHER traffic, and within a class the
/// retry sub-queue is drained before the normal sub-queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueClass {
    OrderRetry,
    OrderNormal,
    OtherRetry,
    OtherNormal,
}

impl QueueClass {
    /// All queues in poll priority order (highest first).
    pub const ALL: [QueueClass; 4] = [
        QueueClass::OrderRetry,
        QueueClass::OrderNormal,
        QueueClass::OtherRetry,
        QueueClass::OtherNormal,
    ];

    /// Single-byte key tag. Also encodes priority: lower tag sorts first.
    pub(crate) fn tag(self) -> u8 {
        match self {
            QueueClass::OrderRetry => b'1',
            QueueClass::OrderNormal => b'2',
            QueueClass::OtherRetry => b'3',
            QueueClass::OtherNormal => b'4',
        }
    }

    /// Retry queues apply the score-based eligibility window on poll.
    pub fn is_retry(self) -> bool {
        matches!(self, QueueClass::OrderRetry | QueueClass::OtherRetry)
    }

    /// Dense index for per-queue counters.
    pub(crate) fn idx(self) -> usize {
        match self {
            QueueClass::OrderRetry => 0,
            QueueClass::OrderNormal => 1,
            QueueClass::OtherRetry => 2,
            QueueClass::OtherNormal => 3,
        }
    }

    /// Tenant-class label used in verdicts and metrics ("ORDER" / "OTHER").
    pub fn class_label(self) -> &'static str {
        match self {
            QueueClass::OrderRetry | QueueClass::OrderNormal => "ORDER",
            QueueClass::OtherRetry | QueueClass::OtherNormal => "OTHER",
        }
    }
}

impl std::fmt::Display for QueueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueueClass::OrderRetry => "ORDER_RETRY",
            QueueClass::OrderNormal => "ORDER_NORMAL",
            QueueClass::OtherRetry => "OTHER_RETRY",
            QueueClass::OtherNormal => "OTHER_NORMAL",
        };
        f.write_str(s)
    }
}

/// A queued admission request. The payload is opaque to the engine; the
/// score is the enqueue timestamp for normal queues and the failure
/// timestamp for retry queues (an entry becomes poll-eligible once its
/// score falls behind the retry threshold).
///
/// Entries are created on enqueue, read+deleted atomically by the poller,
/// and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub payload: String,
    pub score: u64,
}

impl QueueEntry {
    pub fn new(payload: impl Into<String>, score: u64) -> Self {
        Self {
            payload: payload.into(),
            score,
        }
    }
}
