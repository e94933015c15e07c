//! `flowsmith sync` keeps the knowledge graph in step with the node catalog.

use flowsmith_config::AppConfig;
use flowsmith_core::event::EventBus;
use flowsmith_providers::RestPlatformClient;
use flowsmith_sync::{FileSnapshotStore, GraphUpdateLoop};
use std::sync::Arc;
use tracing::info;

pub async fn run(config: &AppConfig, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    let graph = super::build_graph(config)
        .ok_or("graph.bridge_url is not configured; nothing to sync into")?;
    let state_path = config.sync.resolved_state_path();

    let sync = GraphUpdateLoop::new(
        Arc::new(RestPlatformClient::from_config(&config.platform)),
        graph,
        Arc::new(FileSnapshotStore::new(&state_path)),
    )
    .with_config(&config.sync)
    .with_events(Arc::new(EventBus::default()));

    if once {
        let outcome = sync.tick().await?;
        if outcome.changed {
            println!(
                "Catalog synced: {} added, {} modified, {} removed ({} entries)",
                outcome.added, outcome.modified, outcome.removed, outcome.total_entries
            );
        } else {
            println!("Catalog unchanged ({} entries)", outcome.total_entries);
        }
        println!("Fingerprint: {}", outcome.fingerprint);
        return Ok(());
    }

    if !config.sync.enabled {
        return Err("sync.enabled is false; set it in config or use --once".into());
    }

    info!(state = %state_path.display(), "Starting catalog sync; Ctrl-C to stop");
    let handle = sync.start();
    tokio::signal::ctrl_c().await?;
    handle.stop().await;

    Ok(())
}
