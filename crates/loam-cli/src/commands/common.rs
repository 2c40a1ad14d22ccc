use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loam_core::db::Database;
use loam_core::models::{FieldValue, MirrorRow};
use loam_core::remote::{PocketBaseClient, RemoteConfig};
use loam_core::util::normalize_text_option;
use serde::Serialize;

use crate::error::CliError;

pub const SERVER_URL_VAR: &str = "LOAM_SERVER_URL";
pub const IDENTITY_VAR: &str = "LOAM_IDENTITY";
pub const PASSWORD_VAR: &str = "LOAM_PASSWORD";

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub server_id: String,
    pub title: String,
    pub content: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub updated_iso: String,
}

/// Resolve the database path: explicit flag, or the platform data dir.
pub fn resolve_db_path(flag: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = flag {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("loam").join("loam.db"))
        .ok_or_else(|| CliError::Config("could not determine a data directory".to_string()))
}

/// Open (and migrate) the local mirror database.
pub async fn open_database(db_path: &Path) -> Result<Arc<Database>, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(Database::open(db_path).await?))
}

fn env_value(name: &str) -> Option<String> {
    normalize_text_option(env::var(name).ok())
}

/// Build a client from `LOAM_SERVER_URL`; unconfigured when the var is unset.
pub fn build_client() -> Result<PocketBaseClient, CliError> {
    let config = match env_value(SERVER_URL_VAR) {
        Some(url) => RemoteConfig::new(url),
        None => RemoteConfig::default(),
    };
    Ok(PocketBaseClient::new(config)?)
}

/// Build a client and authenticate it from the environment.
///
/// Returns the client and the authenticated user's id.
pub async fn authenticated_client() -> Result<(PocketBaseClient, String), CliError> {
    let client = build_client()?;
    let (Some(identity), Some(password)) = (env_value(IDENTITY_VAR), env_value(PASSWORD_VAR))
    else {
        return Err(CliError::SyncNotConfigured);
    };

    let user_id = client
        .authenticate_with_password(&identity, &password)
        .await?;
    Ok((client, user_id))
}

pub fn note_to_list_item(row: &MirrorRow) -> NoteListItem {
    NoteListItem {
        server_id: row.server_id.clone(),
        title: text_field(row, "title").unwrap_or_default(),
        content: text_field(row, "content"),
        created_at: row.created_at,
        updated_at: row.updated_at,
        updated_iso: format_timestamp(row.updated_at),
    }
}

pub fn format_note_lines(rows: &[MirrorRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let item = note_to_list_item(row);
            format!("{}  {}  {}", item.server_id, item.updated_iso, item.title)
        })
        .collect()
}

fn text_field(row: &MirrorRow, name: &str) -> Option<String> {
    row.field(name)
        .and_then(FieldValue::as_text)
        .map(ToString::to_string)
}

fn format_timestamp(unix_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(unix_ms)
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string())
}
