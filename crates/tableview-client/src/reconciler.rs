//! Partition Reconciler
//!
//! Keeps the reader set in line with the partitions the log reports for the
//! topic. A round lists the partitions, starts readers for new ones and closes
//! readers for vanished ones. Additions and removals run concurrently; the
//! round ends when all of them have finished.
//!
//! The background loop sleeps for the configured interval *after* each round,
//! so rounds never overlap. A failed round is logged and the loop carries on.

use crate::error::Result;
use crate::reader::{PartitionReader, ViewContext};
use crate::reader_set::ReaderSet;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tableview_observability::metrics::{PARTITIONS, RECONCILE_ROUNDS_TOTAL};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one reconciliation round changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RoundSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

pub(crate) struct PartitionReconciler<T> {
    ctx: Arc<ViewContext<T>>,
    readers: Arc<ReaderSet>,
    interval: Duration,
}

impl<T> PartitionReconciler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ctx: Arc<ViewContext<T>>, readers: Arc<ReaderSet>, interval: Duration) -> Self {
        Self {
            ctx,
            readers,
            interval,
        }
    }

    /// Run one round and record its outcome.
    pub async fn run_round(&self) -> Result<RoundSummary> {
        let result = self.reconcile().await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        RECONCILE_ROUNDS_TOTAL
            .with_label_values(&[&self.ctx.topic, outcome])
            .inc();
        result
    }

    async fn reconcile(&self) -> Result<RoundSummary> {
        let topic = &self.ctx.topic;
        let listed = self.ctx.transport.list_partitions(topic).await?;
        let current = self.readers.partitions().await;

        let to_add: Vec<String> = listed
            .iter()
            .filter(|p| !current.contains(*p))
            .cloned()
            .collect();
        let to_remove: Vec<String> = current
            .into_iter()
            .filter(|p| !listed.contains(p))
            .collect();

        if to_add.is_empty() && to_remove.is_empty() {
            debug!(topic = %topic, partitions = listed.len(), "Partitions unchanged");
            return Ok(RoundSummary::default());
        }

        let adds: Vec<_> = to_add
            .into_iter()
            .map(|partition| PartitionReader::start(partition, Arc::clone(&self.ctx)))
            .collect();
        let removes: Vec<_> = to_remove
            .iter()
            .cloned()
            .map(|partition| self.remove_reader(partition))
            .collect();

        let (started, _) = tokio::join!(join_all(adds), join_all(removes));

        let mut summary = RoundSummary {
            added: Vec::new(),
            removed: to_remove,
        };
        let mut first_error = None;

        for result in started {
            match result {
                Ok(reader) => {
                    summary.added.push(reader.partition().to_string());
                    if let Some(mut displaced) = self.readers.insert(reader).await {
                        displaced.close().await;
                    }
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Failed to start partition reader");
                    first_error.get_or_insert(e);
                }
            }
        }

        PARTITIONS
            .with_label_values(&[topic])
            .set(self.readers.len().await as i64);

        if !summary.added.is_empty() {
            info!(
                topic = %topic,
                partitions = ?summary.added,
                "Added partitions to table view"
            );
        }
        if !summary.removed.is_empty() {
            info!(
                topic = %topic,
                partitions = ?summary.removed,
                "Removed partitions from table view"
            );
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    async fn remove_reader(&self, partition: String) {
        if let Some(mut reader) = self.readers.remove(&partition).await {
            reader.close().await;
        }
    }

    /// Spawn the periodic loop. It stops once `cancel` fires; a round already
    /// running when that happens is finished first.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(
                topic = %self.ctx.topic,
                interval_seconds = self.interval.as_secs(),
                "Partition reconciler started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }

                if cancel.is_cancelled() {
                    break;
                }

                if let Err(e) = self.run_round().await {
                    warn!(
                        topic = %self.ctx.topic,
                        error = %e,
                        "Failed to check for changes in number of partitions"
                    );
                }
            }

            debug!(topic = %self.ctx.topic, "Partition reconciler stopped");
        })
    }
}
