//! Active view gauge accounting.
//!
//! Kept in its own test binary so no other view moves the process-wide gauge
//! while these assertions run.

use std::sync::Arc;
use tableview_client::TableView;
use tableview_core::StringSchema;
use tableview_log::{LogTransport, MemoryLog};
use tableview_observability::metrics::{ACTIVE_VIEWS, PARTITIONS};

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
async fn test_active_views_follows_drop_and_close() {
    let log = Arc::new(MemoryLog::new());
    log.create_partitioned_topic("gauge-dropped", 2).unwrap();
    log.create_topic("gauge-closed").unwrap();

    tableview_observability::init();
    let baseline = ACTIVE_VIEWS.get();

    // Dropped without close
    let dropped = view(&log, "gauge-dropped").await;
    assert_eq!(ACTIVE_VIEWS.get(), baseline + 1);
    assert_eq!(PARTITIONS.with_label_values(&["gauge-dropped"]).get(), 2);
    drop(dropped);
    assert_eq!(ACTIVE_VIEWS.get(), baseline);
    assert_eq!(PARTITIONS.with_label_values(&["gauge-dropped"]).get(), 0);

    // Closed, then dropped: counted down once
    let closed = view(&log, "gauge-closed").await;
    assert_eq!(ACTIVE_VIEWS.get(), baseline + 1);
    closed.close().await.unwrap();
    assert_eq!(ACTIVE_VIEWS.get(), baseline);
    drop(closed);
    assert_eq!(ACTIVE_VIEWS.get(), baseline);

    // A view that never started does not touch the gauge
    let failed = TableView::<String>::builder(
        Arc::clone(&log) as Arc<dyn LogTransport>,
        Arc::new(StringSchema),
    )
    .topic("gauge-never-created")
    .create()
    .await;
    assert!(failed.is_err());
    assert_eq!(ACTIVE_VIEWS.get(), baseline);
}
