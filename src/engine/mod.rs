pub mod allocator;
pub mod command;
pub mod config;
mod core;
pub mod metrics;
mod poller;
pub mod result;

use std::sync::Arc;
use std::thread;

use tracing::info;

use crate::entry::QueueClass;
use crate::error::{EngineError, EngineResult};
use crate::limit::DynamicLimit;
use crate::limiter::BucketRegistry;
use crate::storage::Storage;

pub use command::{EngineCommand, PollRequest};
pub use config::EngineConfig;
pub use result::{BucketReport, PollResult, PollStats, PolledItem};

use self::core::EngineCore;

/// The engine owns the core thread and the inbound command channel.
/// Caller threads send commands through `send_command()`; the
/// single-threaded core processes them sequentially and is the
/// serialization point for all four queues.
pub struct Engine {
    command_tx: crossbeam_channel::Sender<EngineCommand>,
    core_thread: Option<thread::JoinHandle<()>>,
}

impl Engine {
    /// Create a new engine, spawning the core on a dedicated OS thread.
    #[tracing::instrument(skip_all)]
    pub fn new(
        config: &EngineConfig,
        storage: Arc<dyn Storage>,
        buckets: Arc<BucketRegistry>,
        global_limit: Arc<DynamicLimit>,
    ) -> EngineResult<Self> {
        let (tx, rx) =
            crossbeam_channel::bounded::<EngineCommand>(config.core.command_channel_capacity);

        let core_config = config.core.clone();
        let bucket_config = config.bucket.clone();

        let handle = thread::Builder::new()
            .name("floodgate-core".to_string())
            .spawn(move || {
                let mut core = EngineCore::new(
                    storage,
                    rx,
                    buckets,
                    global_limit,
                    &core_config,
                    &bucket_config,
                );
                core.run();
            })
            .map_err(|e| EngineError::CoreSpawn(e.to_string()))?;

        info!("engine started");

        Ok(Self {
            command_tx: tx,
            core_thread: Some(handle),
        })
    }

    /// Send a command to the core. Returns an error if the channel is full
    /// or disconnected.
    pub fn send_command(&self, cmd: EngineCommand) -> EngineResult<()> {
        self.command_tx.try_send(cmd).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => EngineError::ChannelFull,
            crossbeam_channel::TrySendError::Disconnected(_) => EngineError::ChannelDisconnected,
        })
    }

    /// Enqueue an entry and wait for the queue depth after insert.
    /// Blocking; not for use inside an async runtime.
    pub fn enqueue(&self, queue: QueueClass, payload: String, score: u64) -> EngineResult<u64> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.send_command(EngineCommand::Enqueue {
            queue,
            payload,
            score,
            reply,
        })?;
        let depth = rx
            .blocking_recv()
            .map_err(|_| EngineError::ReplyDropped)??;
        Ok(depth)
    }

    /// Execute one poll cycle and wait for the batch. Blocking.
    pub fn poll(&self, request: PollRequest) -> EngineResult<PollResult> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.send_command(EngineCommand::Poll { request, reply })?;
        rx.blocking_recv().map_err(|_| EngineError::ReplyDropped)
    }

    /// Current depth of one queue. Blocking.
    pub fn depth(&self, queue: QueueClass) -> EngineResult<u64> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.send_command(EngineCommand::Depth { queue, reply })?;
        rx.blocking_recv().map_err(|_| EngineError::ReplyDropped)
    }

    /// Initiate graceful shutdown: send the shutdown command and wait for
    /// the core thread to finish.
    pub fn shutdown(mut self) -> EngineResult<()> {
        info!("initiating engine shutdown");

        let _ = self.command_tx.send(EngineCommand::Shutdown);

        if let Some(handle) = self.core_thread.take() {
            handle.join().map_err(|_| EngineError::CorePanicked)?;
        }

        info!("engine shutdown complete");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // If shutdown wasn't called explicitly, attempt to stop the core
        if self.core_thread.is_some() {
            let _ = self.command_tx.send(EngineCommand::Shutdown);
            if let Some(handle) = self.core_thread.take() {
                let _ = handle.join();
            }
        }
    }
}
