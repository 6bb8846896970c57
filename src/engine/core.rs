use std::sync::Arc;

use crossbeam_channel::Receiver;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::command::EngineCommand;
use crate::engine::config::{BucketConfig, CoreConfig};
use crate::engine::metrics::Metrics;
use crate::entry::{QueueClass, QueueEntry};
use crate::error::StorageError;
use crate::limit::DynamicLimit;
use crate::limiter::BucketRegistry;
use crate::storage::{keys, Storage};

/// Single-threaded engine core. Owns all queue mutation and processes
/// commands from caller threads sequentially, so every read-then-remove
/// against a queue is indivisible with respect to concurrent callers.
pub struct EngineCore {
    pub(super) storage: Arc<dyn Storage>,
    pub(super) inbound: Receiver<EngineCommand>,
    pub(super) buckets: Arc<BucketRegistry>,
    pub(super) global_limit: Arc<DynamicLimit>,
    pub(super) bucket_config: BucketConfig,
    idle_timeout: Duration,
    running: bool,
    /// In-memory per-queue depth, rebuilt from storage on startup.
    pub(super) depths: [u64; 4],
    pub(super) metrics: Metrics,
}

impl EngineCore {
    pub fn new(
        storage: Arc<dyn Storage>,
        inbound: Receiver<EngineCommand>,
        buckets: Arc<BucketRegistry>,
        global_limit: Arc<DynamicLimit>,
        core_config: &CoreConfig,
        bucket_config: &BucketConfig,
    ) -> Self {
        Self {
            storage,
            inbound,
            buckets,
            global_limit,
            bucket_config: bucket_config.clone(),
            idle_timeout: Duration::from_millis(core_config.idle_timeout_ms),
            running: true,
            depths: [0; 4],
            metrics: Metrics::new(),
        }
    }

    /// Run the core event loop. Blocks the current thread until a
    /// `Shutdown` command is received or the inbound channel disconnects.
    pub fn run(&mut self) {
        info!("engine core started");
        self.recover();

        while self.running {
            match self.inbound.recv_timeout(self.idle_timeout) {
                Ok(cmd) => {
                    self.handle_command(cmd);
                    // Drain whatever queued up behind it before parking again
                    while self.running {
                        match self.inbound.try_recv() {
                            Ok(cmd) => self.handle_command(cmd),
                            Err(_) => break,
                        }
                    }
                    self.record_gauges();
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    self.record_gauges();
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    info!("inbound channel disconnected, shutting down");
                    self.running = false;
                }
            }
        }

        if let Err(e) = self.storage.flush() {
            warn!(error = %e, "failed to flush storage during shutdown");
        }

        info!("engine core stopped");
    }

    pub(super) fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Enqueue {
                queue,
                payload,
                score,
                reply,
            } => {
                debug!(%queue, score, "enqueue command received");
                let result = self.handle_enqueue(queue, payload, score);
                let _ = reply.send(result);
            }
            EngineCommand::Poll { request, reply } => {
                debug!(total_slots = request.total_slots, "poll command received");
                let result = self.handle_poll(&request);
                let _ = reply.send(result);
            }
            EngineCommand::Depth { queue, reply } => {
                let _ = reply.send(self.depths[queue.idx()]);
            }
            EngineCommand::Shutdown => {
                info!("shutdown command received");
                self.running = false;
            }
        }
    }

    pub(super) fn handle_enqueue(
        &mut self,
        queue: QueueClass,
        payload: String,
        score: u64,
    ) -> Result<u64, StorageError> {
        let key = keys::entry_key(queue, score, payload.as_bytes());
        let entry = QueueEntry { payload, score };
        self.storage.put_entry(&key, &entry)?;

        self.depths[queue.idx()] += 1;
        self.metrics.record_enqueue(queue);
        Ok(self.depths[queue.idx()])
    }

    /// Rebuild per-queue depth counters from storage after a restart.
    fn recover(&mut self) {
        for queue in QueueClass::ALL {
            match self.storage.count_entries(queue) {
                Ok(count) => {
                    self.depths[queue.idx()] = count;
                    if count > 0 {
                        info!(%queue, count, "recovered queue depth");
                    }
                }
                Err(e) => {
                    warn!(%queue, error = %e, "failed to recover queue depth");
                }
            }
        }
    }

    fn record_gauges(&self) {
        for queue in QueueClass::ALL {
            self.metrics.record_depth(queue, self.depths[queue.idx()]);
        }
    }

    /// Access the storage layer (used by tests).
    #[cfg(test)]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }
}

#[cfg(test)]
mod tests;
