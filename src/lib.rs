pub mod admission;
pub mod bucket;
mod clock;
pub mod engine;
pub mod entry;
pub mod error;
pub mod limit;
pub mod limiter;
pub mod storage;
pub mod telemetry;

pub use admission::{AdmissionRequest, AdmissionService, HttpRequestSummary, QueuedRequest, Verdict};
pub use bucket::BucketState;
pub use engine::{Engine, EngineConfig, PollRequest, PollResult};
pub use entry::{QueueClass, QueueEntry};
pub use error::{EngineError, EngineResult, StorageError, StorageResult};
pub use limit::DynamicLimit;
pub use limiter::{BucketLimiter, BucketRegistry};
pub use storage::{RocksDbStorage, Storage, WriteBatchOp};
