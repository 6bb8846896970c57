use serde::{Deserialize, Serialize};

/// Leaky-bucket state for a single rate-limited key.
///
/// The water level rises by one per admitted unit and drains continuously
/// at the caller-supplied leak rate. Leak rate and capacity are passed in
/// on every call rather than stored, so the dynamic rate controller can
/// swap the rate between calls without touching persisted state.
///
/// The decay math is plain arithmetic on millisecond timestamps: given
/// the same inputs it always produces the same level, so persisted state
/// survives process restarts without drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub water_level: f64,
    pub last_leak_ms: u64,
}

impl BucketState {
    /// A fresh, empty bucket. Cold starts fail open: absent or expired
    /// state is replaced with this.
    pub fn empty(now_ms: u64) -> Self {
        Self {
            water_level: 0.0,
            last_leak_ms: now_ms,
        }
    }

    /// Apply time-based leak, then admit up to `requested` units within the
    /// remaining integral headroom. Returns the number actually admitted
    /// (possibly 0, never more than `requested`).
    ///
    /// Post-condition: `0 <= water_level <= max(capacity, pre-leak level)`.
    pub fn consume(&mut self, requested: u64, now_ms: u64, leak_rate: f64, capacity: f64) -> u64 {
        let elapsed_sec = now_ms.saturating_sub(self.last_leak_ms) as f64 / 1000.0;
        let leaked = leak_rate.max(0.0) * elapsed_sec;
        self.water_level = (self.water_level - leaked).max(0.0);

        let available = (capacity - self.water_level).floor().max(0.0) as u64;
        let consumed = requested.min(available);

        self.water_level += consumed as f64;
        self.last_leak_ms = now_ms;
        consumed
    }

    /// Apply leak without consuming (a `consume(0)` with clearer intent).
    pub fn leak(&mut self, now_ms: u64, leak_rate: f64) {
        let elapsed_sec = now_ms.saturating_sub(self.last_leak_ms) as f64 / 1000.0;
        self.water_level = (self.water_level - leak_rate.max(0.0) * elapsed_sec).max(0.0);
        self.last_leak_ms = now_ms;
    }

    /// Integral headroom left below capacity.
    pub fn available(&self, capacity: f64) -> u64 {
        (capacity - self.water_level).floor().max(0.0) as u64
    }

    /// True once the bucket is at or above 90% of capacity.
    pub fn is_saturated(&self, capacity: f64) -> bool {
        capacity > 0.0 && self.water_level / capacity >= 0.90
    }
}
