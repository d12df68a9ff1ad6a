use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Map Metrics
    // ============================================================================

    /// Keyed messages merged into a view
    pub static ref MESSAGES_APPLIED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tableview_messages_applied_total", "Total messages merged into table views"),
        &["topic"]
    ).expect("metric can be created");

    /// Messages without a key, read and discarded
    pub static ref KEYLESS_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tableview_keyless_messages_total", "Total keyless messages skipped"),
        &["topic"]
    ).expect("metric can be created");

    /// Listener callbacks that panicked
    pub static ref LISTENER_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tableview_listener_errors_total", "Total table view listener failures"),
        &["topic"]
    ).expect("metric can be created");

    // ============================================================================
    // Partition Reader Metrics
    // ============================================================================

    /// Messages read while replaying compacted history
    pub static ref REPLAY_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tableview_replay_messages_total", "Total messages replayed from compacted history"),
        &["topic"]
    ).expect("metric can be created");

    /// Time spent replaying one partition
    pub static ref REPLAY_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("tableview_replay_duration_seconds", "Partition replay duration in seconds")
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        &["topic"]
    ).expect("metric can be created");

    /// Tail loops stopped by a read error
    pub static ref TAIL_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tableview_tail_errors_total", "Total tail loops stopped by read errors"),
        &["topic"]
    ).expect("metric can be created");

    // ============================================================================
    // Reconciliation Metrics
    // ============================================================================

    /// Partitions with an open reader
    pub static ref PARTITIONS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("tableview_partitions", "Partitions currently read by table views"),
        &["topic"]
    ).expect("metric can be created");

    /// Reconciliation rounds by outcome
    pub static ref RECONCILE_ROUNDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tableview_reconcile_rounds_total", "Total partition reconciliation rounds"),
        &["topic", "result"] // ok, error
    ).expect("metric can be created");

    /// Open table views
    pub static ref ACTIVE_VIEWS: IntGauge = IntGauge::new(
        "tableview_active_views",
        "Number of open table views"
    ).expect("metric can be created");
}

/// Initialize metrics registry
/// Can be called multiple times safely (idempotent)
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(MESSAGES_APPLIED_TOTAL.clone()))
            .expect("messages_applied_total can be registered");
        REGISTRY
            .register(Box::new(KEYLESS_MESSAGES_TOTAL.clone()))
            .expect("keyless_messages_total can be registered");
        REGISTRY
            .register(Box::new(LISTENER_ERRORS_TOTAL.clone()))
            .expect("listener_errors_total can be registered");
        REGISTRY
            .register(Box::new(REPLAY_MESSAGES_TOTAL.clone()))
            .expect("replay_messages_total can be registered");
        REGISTRY
            .register(Box::new(REPLAY_DURATION.clone()))
            .expect("replay_duration can be registered");
        REGISTRY
            .register(Box::new(TAIL_ERRORS_TOTAL.clone()))
            .expect("tail_errors_total can be registered");
        REGISTRY
            .register(Box::new(PARTITIONS.clone()))
            .expect("partitions can be registered");
        REGISTRY
            .register(Box::new(RECONCILE_ROUNDS_TOTAL.clone()))
            .expect("reconcile_rounds_total can be registered");
        REGISTRY
            .register(Box::new(ACTIVE_VIEWS.clone()))
            .expect("active_views can be registered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        init();
        // If no panic, registration succeeded
    }

    #[test]
    fn test_counter_metrics() {
        MESSAGES_APPLIED_TOTAL.with_label_values(&["metrics-test"]).inc();
        REPLAY_MESSAGES_TOTAL
            .with_label_values(&["metrics-test"])
            .inc_by(42);

        assert_eq!(
            MESSAGES_APPLIED_TOTAL.with_label_values(&["metrics-test"]).get(),
            1
        );
        assert_eq!(
            REPLAY_MESSAGES_TOTAL.with_label_values(&["metrics-test"]).get(),
            42
        );
    }

    #[test]
    fn test_partitions_gauge() {
        PARTITIONS.with_label_values(&["gauge-test"]).set(16);

        assert_eq!(PARTITIONS.with_label_values(&["gauge-test"]).get(), 16);
    }
}
