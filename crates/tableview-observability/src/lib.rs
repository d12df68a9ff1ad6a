//! TableView Observability
//!
//! Provides the Prometheus metrics emitted by table views.
//!
//! # Features
//!
//! - Global Prometheus registry shared by every view in the process
//! - Per-topic counters for applied, skipped and failed messages
//! - Replay duration histogram and partition gauges
//! - Text-format rendering for whatever endpoint the application exposes
//!
//! # Usage
//!
//! ```no_run
//! use tableview_observability::{exporter, metrics};
//!
//! // Initialize metrics
//! metrics::init();
//!
//! // Render for scraping
//! let body = exporter::gather_text().unwrap();
//! ```

pub mod exporter;
pub mod metrics;

// Re-export commonly used items
pub use exporter::gather_text;
pub use metrics::{init as init_metrics, REGISTRY};

/// Initialize all observability components
pub fn init() {
    metrics::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_does_not_panic() {
        init();
    }

    #[test]
    fn test_double_init_is_safe() {
        init();
        init();
    }

    #[test]
    fn test_registry_accessible() {
        init();
        let _registry = &*REGISTRY;
    }
}
