use std::path::Path;
use std::sync::Arc;

use loam_core::sync::{RealtimeManager, SyncScheduler};

use crate::commands::common::{authenticated_client, open_database};
use crate::error::CliError;

/// Run an initial reconciliation pass, then keep the mirror current from
/// the realtime stream until interrupted.
pub async fn run_watch(db_path: &Path) -> Result<(), CliError> {
    let (client, _user_id) = authenticated_client().await?;
    let db = open_database(db_path).await?;

    let scheduler = SyncScheduler::new(client.clone(), Arc::clone(&db));
    scheduler.trigger();

    let mut realtime = RealtimeManager::new(client, db);
    realtime.subscribe().await;
    println!("Watching for changes (Ctrl-C to stop)...");

    tokio::signal::ctrl_c().await?;

    realtime.unsubscribe().await;
    scheduler.wait_until_idle().await;
    Ok(())
}
