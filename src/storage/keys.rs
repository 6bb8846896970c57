//! Key encoding for the RocksDB column families.
//!
//! Entry keys are `{queue_tag}:{be64 score}:{payload}`. Big-endian scores
//! make lexicographic iteration equal oldest-score-first order, with the
//! payload bytes breaking ties deterministically. The payload is the last
//! segment, so it needs no length prefix.

use crate::entry::QueueClass;

const SEPARATOR: u8 = b':';

/// Encode a u64 as 8 big-endian bytes.
fn encode_u64(val: u64) -> [u8; 8] {
    val.to_be_bytes()
}

/// Build an entry key: `{queue_tag}:{score}:{payload}`.
pub fn entry_key(queue: QueueClass, score: u64, payload: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(10 + payload.len());
    key.push(queue.tag());
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_u64(score));
    key.push(SEPARATOR);
    key.extend_from_slice(payload);
    key
}

/// Build the iteration prefix for a queue.
pub fn queue_prefix(queue: QueueClass) -> [u8; 2] {
    [queue.tag(), SEPARATOR]
}
