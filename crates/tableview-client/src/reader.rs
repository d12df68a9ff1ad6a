//! Partition Reader
//!
//! One reader per partition, driven through a small state machine:
//!
//! ```text
//! Opening ──► Replaying ──► Tailing ──► Closing ──► Closed
//!    │            │                                   ▲
//!    ▼            └───────────────────────────────────┘
//!  Failed
//! ```
//!
//! `Failed` means the partition could not be opened and no handle exists. A
//! replay error closes the handle it opened, so that reader ends in `Closed`.
//!
//! `start()` returns once the compacted history of the partition has been
//! replayed into the map. The live tail then runs on its own task until the
//! reader is closed.
//!
//! A read or decode error while tailing stops the tail task. The reader stays
//! in `Tailing` with `stalled = true`; nothing restarts it.

use crate::error::{ClientError, Result};
use crate::map::MaterializedMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tableview_core::{Message, Schema};
use tableview_log::{LogTransport, PartitionHandle, ReaderOptions};
use tableview_observability::metrics::{
    KEYLESS_MESSAGES_TOTAL, MESSAGES_APPLIED_TOTAL, REPLAY_DURATION, REPLAY_MESSAGES_TOTAL,
    TAIL_ERRORS_TOTAL,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a partition reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Opening,
    Replaying,
    Tailing,
    Closing,
    Closed,
    Failed,
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::Opening => "opening",
            ReaderState::Replaying => "replaying",
            ReaderState::Tailing => "tailing",
            ReaderState::Closing => "closing",
            ReaderState::Closed => "closed",
            ReaderState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time status of one partition reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStatus {
    pub state: ReaderState,
    /// Messages read during replay.
    pub replayed: u64,
    /// Messages read while tailing.
    pub tailed: u64,
    /// The tail task stopped on an error.
    pub stalled: bool,
}

impl ReaderStatus {
    fn new() -> Self {
        Self {
            state: ReaderState::Opening,
            replayed: 0,
            tailed: 0,
            stalled: false,
        }
    }
}

/// Everything a reader needs from its view.
pub(crate) struct ViewContext<T> {
    pub topic: String,
    pub map: Arc<MaterializedMap<T>>,
    pub schema: Arc<dyn Schema<T>>,
    pub transport: Arc<dyn LogTransport>,
}

impl<T> ViewContext<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Decode and merge one message. Returns `false` for skipped keyless
    /// messages.
    pub fn apply(&self, msg: Message) -> Result<bool> {
        let Some(key) = msg.key.as_deref() else {
            KEYLESS_MESSAGES_TOTAL.with_label_values(&[&self.topic]).inc();
            debug!(
                topic = %self.topic,
                partition = %msg.partition,
                offset = msg.offset,
                "Skipping message without key"
            );
            return Ok(false);
        };

        let value = self
            .schema
            .decode(&msg.payload)
            .map_err(|source| ClientError::Decode {
                partition: msg.partition.clone(),
                offset: msg.offset,
                source,
            })?;

        debug!(
            topic = %self.topic,
            partition = %msg.partition,
            offset = msg.offset,
            key,
            "Applying message"
        );

        self.map.merge(key, value);
        MESSAGES_APPLIED_TOTAL.with_label_values(&[&self.topic]).inc();
        Ok(true)
    }
}

pub struct PartitionReader {
    partition: String,
    status: Arc<Mutex<ReaderStatus>>,
    cancel: CancellationToken,
    tail_handle: Option<JoinHandle<()>>,
}

impl PartitionReader {
    /// Open the partition, replay its compacted history, then start tailing.
    ///
    /// # Errors
    ///
    /// - `ReaderOpen`: the transport refused to open the partition
    /// - `Read` / `Decode`: replay failed; the handle is closed again
    pub(crate) async fn start<T>(partition: String, ctx: Arc<ViewContext<T>>) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        let status = Arc::new(Mutex::new(ReaderStatus::new()));
        Self::start_with_status(partition, ctx, status).await
    }

    async fn start_with_status<T>(
        partition: String,
        ctx: Arc<ViewContext<T>>,
        status: Arc<Mutex<ReaderStatus>>,
    ) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut handle = match ctx
            .transport
            .open_reader(&partition, ReaderOptions::compacted_from_earliest())
            .await
        {
            Ok(handle) => handle,
            Err(source) => {
                status.lock().state = ReaderState::Failed;
                return Err(ClientError::ReaderOpen { partition, source });
            }
        };

        status.lock().state = ReaderState::Replaying;
        let started = Instant::now();

        let replayed = match replay(&mut *handle, &ctx, &status).await {
            Ok(count) => count,
            Err(e) => {
                status.lock().state = ReaderState::Closing;
                if let Err(close_err) = handle.close().await {
                    warn!(
                        topic = %ctx.topic,
                        partition = %partition,
                        error = %close_err,
                        "Failed to close partition reader after replay error"
                    );
                }
                status.lock().state = ReaderState::Closed;
                return Err(e);
            }
        };

        let elapsed = started.elapsed();
        REPLAY_MESSAGES_TOTAL
            .with_label_values(&[&ctx.topic])
            .inc_by(replayed);
        REPLAY_DURATION
            .with_label_values(&[&ctx.topic])
            .observe(elapsed.as_secs_f64());

        info!(
            topic = %ctx.topic,
            partition = %partition,
            messages = replayed,
            seconds = elapsed.as_secs_f64(),
            "Replayed partition"
        );

        status.lock().state = ReaderState::Tailing;

        let cancel = CancellationToken::new();
        let tail_handle = tokio::spawn(tail(
            handle,
            ctx,
            Arc::clone(&status),
            cancel.clone(),
        ));

        Ok(Self {
            partition,
            status,
            cancel,
            tail_handle: Some(tail_handle),
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn status(&self) -> ReaderStatus {
        *self.status.lock()
    }

    pub fn state(&self) -> ReaderState {
        self.status.lock().state
    }

    /// Stop tailing and release the partition handle. Idempotent.
    pub async fn close(&mut self) {
        {
            let mut status = self.status.lock();
            if matches!(status.state, ReaderState::Closed | ReaderState::Failed) {
                return;
            }
            status.state = ReaderState::Closing;
        }

        self.cancel.cancel();

        if let Some(handle) = self.tail_handle.take() {
            if let Err(e) = handle.await {
                warn!(
                    partition = %self.partition,
                    error = %e,
                    "Tail task ended abnormally"
                );
            }
        }

        self.status.lock().state = ReaderState::Closed;
        info!(partition = %self.partition, "Closed partition reader");
    }
}

impl Drop for PartitionReader {
    fn drop(&mut self) {
        // The tail task closes its handle once it observes cancellation
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PartitionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionReader")
            .field("partition", &self.partition)
            .field("status", &self.status())
            .finish()
    }
}

async fn replay<T>(
    handle: &mut dyn PartitionHandle,
    ctx: &ViewContext<T>,
    status: &Mutex<ReaderStatus>,
) -> Result<u64>
where
    T: Clone + Send + Sync + 'static,
{
    let partition = handle.partition().to_string();
    let read_error = |source| ClientError::Read {
        partition: partition.clone(),
        source,
    };

    let mut count = 0u64;
    while handle.has_message_available().await.map_err(read_error)? {
        let msg = handle.read_next().await.map_err(read_error)?;
        ctx.apply(msg)?;
        count += 1;
        status.lock().replayed = count;
    }
    Ok(count)
}

async fn tail<T>(
    mut handle: Box<dyn PartitionHandle>,
    ctx: Arc<ViewContext<T>>,
    status: Arc<Mutex<ReaderStatus>>,
    cancel: CancellationToken,
) where
    T: Clone + Send + Sync + 'static,
{
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = handle.read_next() => result,
        };

        let applied = match result {
            Ok(msg) => ctx.apply(msg),
            Err(source) => Err(ClientError::Read {
                partition: handle.partition().to_string(),
                source,
            }),
        };

        match applied {
            Ok(_) => status.lock().tailed += 1,
            Err(e) => {
                TAIL_ERRORS_TOTAL.with_label_values(&[&ctx.topic]).inc();
                warn!(
                    topic = %ctx.topic,
                    partition = %handle.partition(),
                    error = %e,
                    "Tail reader was interrupted"
                );
                status.lock().stalled = true;
                break;
            }
        }
    }

    if let Err(e) = handle.close().await {
        warn!(
            topic = %ctx.topic,
            partition = %handle.partition(),
            error = %e,
            "Failed to close partition reader"
        );
    }
}
