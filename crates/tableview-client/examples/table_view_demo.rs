//! Table View Example
//!
//! Materializes a partitioned topic of JSON user profiles, listens for
//! updates and follows a partition increase.
//!
//! Run with:
//! ```bash
//! cargo run --package tableview-client --example table_view_demo
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tableview_client::TableView;
use tableview_core::{JsonSchema, Schema};
use tableview_log::{LogTransport, MemoryLog};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    name: String,
    visits: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let log = Arc::new(MemoryLog::new());
    let schema = Arc::new(JsonSchema::<Profile>::new());

    log.create_partitioned_topic("profiles", 2)?;
    for (i, name) in ["ada", "grace", "linus", "ada"].iter().enumerate() {
        let profile = Profile {
            name: name.to_string(),
            visits: i as u32,
        };
        log.publish("profiles", Some(*name), schema.encode(&profile)?)?;
    }

    let view = TableView::builder(log.clone() as Arc<dyn LogTransport>, schema.clone())
        .topic("profiles")
        .auto_update_partitions_interval(Duration::from_secs(1))
        .create()
        .await?;

    println!("Replayed {} profiles", view.len());
    view.for_each_and_listen(|key, profile| {
        println!("  {} -> {} visits", key, profile.visits);
    });

    log.update_partitioned_topic("profiles", 4)?;
    let profile = Profile {
        name: "margaret".to_string(),
        visits: 1,
    };
    log.publish("profiles", Some("margaret"), schema.encode(&profile)?)?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    for (partition, status) in view.partition_states().await {
        println!("{}: {} ({} replayed)", partition, status.state, status.replayed);
    }

    view.close().await?;
    Ok(())
}
