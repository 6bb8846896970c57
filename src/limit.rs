use std::sync::atomic::{AtomicI64, Ordering};

/// A bounded, atomically adjustable rate limit.
///
/// One instance exists per rate-limited entity (the shared bucket plus one
/// per downstream provider). Operational feedback loops call `increase` /
/// `decrease` out-of-band; the poll path only ever reads. Each adjustment
/// is a single compare-and-swap with the clamp applied inside the update,
/// so concurrent callers cannot push the value outside `[min, max]`.
#[derive(Debug)]
pub struct DynamicLimit {
    value: AtomicI64,
    min: i64,
    max: i64,
}

impl DynamicLimit {
    /// Create a limit clamped to `[min, max]` from the start.
    pub fn new(initial: i64, min: i64, max: i64) -> Self {
        debug_assert!(min <= max, "limit bounds inverted");
        Self {
            value: AtomicI64::new(initial.clamp(min, max)),
            min,
            max,
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Raise the limit by `delta`, capped at the upper bound.
    /// Returns the new value.
    pub fn increase(&self, delta: i64) -> i64 {
        self.shift(delta)
    }

    /// Lower the limit by `delta`, floored at the lower bound.
    /// Returns the new value.
    pub fn decrease(&self, delta: i64) -> i64 {
        self.shift(-delta)
    }

    fn shift(&self, delta: i64) -> i64 {
        let mut current = self.value.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(delta).clamp(self.min, self.max);
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }
}
