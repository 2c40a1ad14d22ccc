//! Remote-first note CRUD: mutate the backend, mirror the result locally.

use std::path::Path;

use loam_core::services::NotesService;

use crate::commands::common::{authenticated_client, note_to_list_item, open_database};
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    content: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let (client, user_id) = authenticated_client().await?;
    let db = open_database(db_path).await?;

    let service = NotesService::new(client, db);
    let row = service.create(title, content, &user_id).await?;
    println!("Created note {}", row.server_id);
    Ok(())
}

pub async fn run_edit(
    server_id: &str,
    title: &str,
    content: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let (client, _user_id) = authenticated_client().await?;
    let db = open_database(db_path).await?;

    let service = NotesService::new(client, db);
    if service.get(server_id).await?.is_none() {
        return Err(CliError::NoteNotFound(server_id.to_string()));
    }

    let row = service.update(server_id, title, content).await?;
    println!("Updated note {}", note_to_list_item(&row).server_id);
    Ok(())
}

pub async fn run_delete(server_id: &str, db_path: &Path) -> Result<(), CliError> {
    let (client, _user_id) = authenticated_client().await?;
    let db = open_database(db_path).await?;

    let service = NotesService::new(client, db);
    service.delete(server_id).await?;
    println!("Deleted note {server_id}");
    Ok(())
}
