use std::path::Path;

use loam_core::sync::SyncScheduler;

use crate::commands::common::{authenticated_client, open_database};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let (client, _user_id) = authenticated_client().await?;
    let db = open_database(db_path).await?;

    let scheduler = SyncScheduler::new(client, db);
    scheduler.trigger();
    scheduler.wait_until_idle().await;

    println!("Sync completed");
    Ok(())
}
