use crate::commands::common::authenticated_client;
use crate::error::CliError;

/// Verify the configured credentials against the remote store.
pub async fn run_login() -> Result<(), CliError> {
    let (_client, user_id) = authenticated_client().await?;
    println!("Authenticated as user {user_id}");
    Ok(())
}
