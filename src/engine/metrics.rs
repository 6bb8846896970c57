use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;

use crate::entry::QueueClass;

/// Core OTel metrics for the engine. Created once during core init and
/// recorded on each operation; instruments are no-ops when no meter
/// provider is configured.
pub struct Metrics {
    pub entries_enqueued: Counter<u64>,
    pub entries_polled: Counter<u64>,
    pub poll_cycles: Counter<u64>,
    pub tokens_consumed: Counter<u64>,
    pub queue_depth: Gauge<u64>,
    pub water_level: Gauge<f64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("floodgate");
        Self::from_meter(&meter)
    }

    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            entries_enqueued: meter
                .u64_counter("floodgate.entries.enqueued")
                .with_description("Total entries enqueued per queue")
                .build(),
            entries_polled: meter
                .u64_counter("floodgate.entries.polled")
                .with_description("Total entries dequeued per queue")
                .build(),
            poll_cycles: meter
                .u64_counter("floodgate.poll.cycles")
                .with_description("Poll cycles executed")
                .build(),
            tokens_consumed: meter
                .u64_counter("floodgate.bucket.tokens_consumed")
                .with_description("Tokens admitted by the shared bucket")
                .build(),
            queue_depth: meter
                .u64_gauge("floodgate.queue.depth")
                .with_description("Current entries per queue")
                .build(),
            water_level: meter
                .f64_gauge("floodgate.bucket.water_level")
                .with_description("Shared bucket water level after the last poll")
                .build(),
        }
    }

    pub fn record_enqueue(&self, queue: QueueClass) {
        self.entries_enqueued
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_polled(&self, queue: QueueClass, count: u64) {
        if count > 0 {
            self.entries_polled
                .add(count, &[KeyValue::new("queue", queue.to_string())]);
        }
    }

    pub fn record_poll_cycle(&self, tokens_consumed: u64, water_level: f64) {
        self.poll_cycles.add(1, &[]);
        if tokens_consumed > 0 {
            self.tokens_consumed.add(tokens_consumed, &[]);
        }
        self.water_level.record(water_level, &[]);
    }

    pub fn record_depth(&self, queue: QueueClass, depth: u64) {
        self.queue_depth
            .record(depth, &[KeyValue::new("queue", queue.to_string())]);
    }
}
