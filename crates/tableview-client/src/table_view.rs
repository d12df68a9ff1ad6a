//! Table View
//!
//! A read-only, continuously updated key-value view over a compacted topic.
//!
//! ## Lifecycle
//!
//! ```text
//! TableViewBuilder::create()
//!   └─► initial round: one reader per partition, history replayed
//!         └─► reconciler task: re-lists partitions every interval
//! TableView::close()
//!   └─► stop reconciler ─► close readers ─► clear map
//! ```
//!
//! `create()` resolves only after every partition has been replayed, so the
//! first `get()` already sees the compacted state of the whole topic.

use crate::builder::TableViewBuilder;
use crate::config::TableViewConfig;
use crate::error::Result;
use crate::map::MaterializedMap;
use crate::reader::{PartitionReader, ReaderStatus, ViewContext};
use crate::reader_set::ReaderSet;
use crate::reconciler::PartitionReconciler;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tableview_core::Schema;
use tableview_log::LogTransport;
use tableview_observability::metrics::{ACTIVE_VIEWS, PARTITIONS};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct TableView<T> {
    config: TableViewConfig,
    ctx: Arc<ViewContext<T>>,
    readers: Arc<ReaderSet>,
    cancel: CancellationToken,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T> TableView<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a builder for a view decoding values with `schema`.
    pub fn builder(
        transport: Arc<dyn LogTransport>,
        schema: Arc<dyn Schema<T>>,
    ) -> TableViewBuilder<T> {
        TableViewBuilder::new(transport, schema)
    }

    /// Run the initial round and start the reconciler.
    ///
    /// If the initial round fails every reader it started is closed and no
    /// view is returned.
    pub(crate) async fn start(
        config: TableViewConfig,
        transport: Arc<dyn LogTransport>,
        schema: Arc<dyn Schema<T>>,
    ) -> Result<Self> {
        tableview_observability::init();

        let ctx = Arc::new(ViewContext {
            topic: config.topic_name.clone(),
            map: Arc::new(MaterializedMap::new(config.topic_name.clone())),
            schema,
            transport,
        });
        let readers = Arc::new(ReaderSet::new());
        let reconciler = PartitionReconciler::new(
            Arc::clone(&ctx),
            Arc::clone(&readers),
            config.auto_update_partitions_interval,
        );

        if let Err(e) = reconciler.run_round().await {
            warn!(topic = %ctx.topic, error = %e, "Failed to start table view");
            close_all(&readers).await;
            PARTITIONS.with_label_values(&[&ctx.topic]).set(0);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let handle = reconciler.spawn(cancel.clone());

        ACTIVE_VIEWS.inc();
        info!(
            topic = %ctx.topic,
            partitions = readers.len().await,
            keys = ctx.map.len(),
            "Started table view"
        );

        Ok(Self {
            config,
            ctx,
            readers,
            cancel,
            reconciler: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic_name
    }

    pub fn config(&self) -> &TableViewConfig {
        &self.config
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.ctx.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctx.map.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.ctx.map.contains_key(key)
    }

    /// Latest value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<T> {
        self.ctx.map.get(key)
    }

    pub fn entries(&self) -> Vec<(String, T)> {
        self.ctx.map.entries()
    }

    pub fn keys(&self) -> Vec<String> {
        self.ctx.map.keys()
    }

    pub fn values(&self) -> Vec<T> {
        self.ctx.map.values()
    }

    /// Visit every current entry once.
    pub fn for_each<F>(&self, action: F)
    where
        F: FnMut(&str, &T),
    {
        self.ctx.map.for_each(action)
    }

    /// Visit every current entry, then keep receiving every future update.
    ///
    /// No update is delivered twice or missed between the snapshot and the
    /// live phase. The listener may itself register further listeners.
    pub fn for_each_and_listen<F>(&self, listener: F)
    where
        F: FnMut(&str, &T) + Send + 'static,
    {
        self.ctx.map.snapshot_and_register(listener)
    }

    /// Status of every partition reader, keyed by partition name.
    pub async fn partition_states(&self) -> BTreeMap<String, ReaderStatus> {
        self.readers.statuses().await
    }

    /// Stop the reconciler, close every reader and clear the view.
    ///
    /// Waits for a reconciliation round already in progress. Calling `close`
    /// again is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut reconciler = self.reconciler.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.cancel.cancel();
        if let Some(handle) = reconciler.take() {
            if let Err(e) = handle.await {
                warn!(topic = %self.ctx.topic, error = %e, "Reconciler task ended abnormally");
            }
        }

        close_all(&self.readers).await;
        self.ctx.map.clear();

        self.closed.store(true, Ordering::SeqCst);
        ACTIVE_VIEWS.dec();
        PARTITIONS.with_label_values(&[&self.ctx.topic]).set(0);

        info!(topic = %self.ctx.topic, "Closed table view");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<T> Drop for TableView<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if !*self.closed.get_mut() {
            ACTIVE_VIEWS.dec();
            PARTITIONS.with_label_values(&[&self.ctx.topic]).set(0);
        }
    }
}

impl<T> std::fmt::Debug for TableView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableView")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

async fn close_all(readers: &ReaderSet) {
    let mut drained = readers.drain().await;
    let closing: Vec<_> = drained.iter_mut().map(PartitionReader::close).collect();
    join_all(closing).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ReaderState;
    use std::time::Duration;
    use tableview_core::StringSchema;
    use tableview_log::MemoryLog;

    async fn view(log: &Arc<MemoryLog>, topic: &str) -> TableView<String> {
        TableView::builder(
            Arc::clone(log) as Arc<dyn LogTransport>,
            Arc::new(StringSchema),
        )
        .topic(topic)
        .create()
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_replays_history() {
        let log = Arc::new(MemoryLog::new());
        log.create_partitioned_topic("view-test", 4).unwrap();
        for i in 0..20 {
            log.publish("view-test", Some(&format!("k{}", i % 5)), i.to_string())
                .unwrap();
        }

        let view = view(&log, "view-test").await;
        assert_eq!(view.topic(), "view-test");
        assert_eq!(view.len(), 5);
        for k in 0..5 {
            assert_eq!(view.get(&format!("k{}", k)), Some((15 + k).to_string()));
        }

        let states = view.partition_states().await;
        assert_eq!(states.len(), 4);
        assert!(states.values().all(|s| s.state == ReaderState::Tailing));

        view.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_clears_and_releases() {
        let log = Arc::new(MemoryLog::new());
        log.create_topic("view-close").unwrap();
        log.publish("view-close", Some("a"), "1").unwrap();

        let view = view(&log, "view-close").await;
        assert_eq!(log.open_reader_count(), 1);

        view.close().await.unwrap();
        assert!(view.is_closed());
        assert!(view.is_empty());
        assert_eq!(view.get("a"), None);
        assert!(view.partition_states().await.is_empty());
        assert_eq!(log.open_reader_count(), 0);

        view.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_fails_for_missing_topic() {
        let log = Arc::new(MemoryLog::new());
        let result = TableView::<String>::builder(
            Arc::clone(&log) as Arc<dyn LogTransport>,
            Arc::new(StringSchema),
        )
        .topic("view-missing")
        .create()
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_for_each_and_listen() {
        let log = Arc::new(MemoryLog::new());
        log.create_topic("view-listen").unwrap();
        log.publish("view-listen", Some("a"), "1").unwrap();

        let view = view(&log, "view-listen").await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        view.for_each_and_listen(move |k, v| {
            let _ = tx.send((k.to_string(), v.clone()));
        });

        assert_eq!(rx.recv().await, Some(("a".to_string(), "1".to_string())));

        log.publish("view-listen", Some("b"), "2").unwrap();
        let live = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(live, Some(("b".to_string(), "2".to_string())));

        view.close().await.unwrap();
    }
}
