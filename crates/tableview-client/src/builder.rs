//! Builder for [`TableView`].

use crate::config::TableViewConfig;
use crate::error::Result;
use crate::table_view::TableView;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tableview_core::Schema;
use tableview_log::LogTransport;

/// Builder for creating a TableView with custom configuration.
///
/// # Example
///
/// ```ignore
/// let view = TableView::builder(transport, Arc::new(StringSchema))
///     .topic("orders")
///     .auto_update_partitions_interval(Duration::from_secs(10))
///     .create()
///     .await?;
/// ```
pub struct TableViewBuilder<T> {
    transport: Arc<dyn LogTransport>,
    schema: Arc<dyn Schema<T>>,
    config: TableViewConfig,
}

impl<T> TableViewBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn LogTransport>, schema: Arc<dyn Schema<T>>) -> Self {
        Self {
            transport,
            schema,
            config: TableViewConfig::default(),
        }
    }

    /// Set the topic to materialize.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.topic_name = topic.into().trim().to_string();
        self
    }

    /// Set how often the partition list is re-checked (default: 60s).
    pub fn auto_update_partitions_interval(mut self, interval: Duration) -> Self {
        self.config.auto_update_partitions_interval = interval;
        self
    }

    /// Overlay a string-keyed configuration map.
    ///
    /// # Errors
    ///
    /// `ConfigError` for unknown keys or mistyped values.
    pub fn load_conf(mut self, conf: HashMap<String, Value>) -> Result<Self> {
        self.config = self.config.load_conf(conf)?;
        Ok(self)
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: TableViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration, replay every partition and start the view.
    ///
    /// # Errors
    ///
    /// - `ConfigError`: invalid configuration, nothing was opened
    /// - `Log`: the topic's partitions could not be listed
    /// - `ReaderOpen` / `Read` / `Decode`: a partition could not be replayed;
    ///   readers already started are closed again
    pub async fn create(self) -> Result<TableView<T>> {
        let config = self.config.validated()?;
        TableView::start(config, self.transport, self.schema).await
    }
}
