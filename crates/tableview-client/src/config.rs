//! Table View Configuration
//!
//! ## TableViewConfig
//!
//! - **topic_name**: Topic to materialize (required, trimmed, non-blank)
//! - **auto_update_partitions_interval**: How often the partition list is
//!   re-checked (default: 60s, minimum: 1s)
//!
//! The interval is (de)serialized as whole seconds under the key
//! `auto_update_partitions_seconds`. camelCase keys (`topicName`,
//! `autoUpdatePartitionsSeconds`) are accepted too, so configuration maps
//! written for other clients load unchanged.
//!
//! ## Usage
//!
//! ```ignore
//! use tableview_client::TableViewConfig;
//!
//! let config = TableViewConfig {
//!     topic_name: "orders".to_string(),
//!     ..Default::default()
//! }
//! .validated()?;
//!
//! // Overlay a string-keyed map, e.g. parsed from a JSON file
//! let config = config.load_conf(HashMap::from([
//!     ("autoUpdatePartitionsSeconds".to_string(), json!(5)),
//! ]))?;
//! ```

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Smallest accepted partition refresh interval.
pub const MIN_AUTO_UPDATE_PARTITIONS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableViewConfig {
    /// Topic to materialize
    #[serde(default, alias = "topicName")]
    pub topic_name: String,

    /// Partition list refresh interval (default: 60s)
    #[serde(
        rename = "auto_update_partitions_seconds",
        alias = "autoUpdatePartitionsSeconds",
        default = "default_auto_update_partitions_interval",
        with = "duration_secs"
    )]
    pub auto_update_partitions_interval: Duration,
}

impl Default for TableViewConfig {
    fn default() -> Self {
        Self {
            topic_name: String::new(),
            auto_update_partitions_interval: default_auto_update_partitions_interval(),
        }
    }
}

fn default_auto_update_partitions_interval() -> Duration {
    Duration::from_secs(60)
}

impl TableViewConfig {
    /// Trim the topic name and check every field.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the topic is blank or the interval is below one second.
    pub fn validated(mut self) -> Result<Self> {
        self.topic_name = self.topic_name.trim().to_string();

        if self.topic_name.is_empty() {
            return Err(ClientError::ConfigError("topic cannot be blank".into()));
        }

        if self.auto_update_partitions_interval < MIN_AUTO_UPDATE_PARTITIONS_INTERVAL {
            return Err(ClientError::ConfigError(format!(
                "auto update partitions interval must be at least {:?}, got {:?}",
                MIN_AUTO_UPDATE_PARTITIONS_INTERVAL, self.auto_update_partitions_interval
            )));
        }

        Ok(self)
    }

    /// Overlay a string-keyed configuration map onto this configuration.
    ///
    /// Keys not present in `overrides` keep their current value. The result
    /// is not validated; `validated()` runs when the view is created.
    ///
    /// # Errors
    ///
    /// `ConfigError` for unknown keys or values of the wrong type.
    pub fn load_conf(&self, overrides: HashMap<String, Value>) -> Result<Self> {
        let mut merged = serde_json::to_value(self)
            .map_err(|e| ClientError::ConfigError(format!("cannot serialize config: {}", e)))?;

        if let Value::Object(fields) = &mut merged {
            for (key, value) in overrides {
                fields.insert(canonical_key(&key).to_string(), value);
            }
        }

        serde_json::from_value(merged)
            .map_err(|e| ClientError::ConfigError(format!("invalid config: {}", e)))
    }
}

/// Map camelCase keys onto the serialized field names.
fn canonical_key(key: &str) -> &str {
    match key {
        "topicName" => "topic_name",
        "autoUpdatePartitionsSeconds" => "auto_update_partitions_seconds",
        other => other,
    }
}

/// Serde helpers for Duration serialization (whole seconds).
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
