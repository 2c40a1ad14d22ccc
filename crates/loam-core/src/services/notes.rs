//! Note CRUD against the remote store, mirrored locally.
//!
//! The remote store is authoritative: every mutation goes to it first and
//! the returned record is what lands in the mirror, through the same
//! upsert/delete primitives the sync engine uses.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::db::{Database, MirrorRepository};
use crate::error::{Error, Result};
use crate::models::MirrorRow;
use crate::remote::RemoteStore;
use crate::schema::NOTES;
use crate::sync::translate;

/// Application-level note operations.
#[derive(Clone)]
pub struct NotesService<R: RemoteStore> {
    remote: R,
    db: Arc<Database>,
}

impl<R: RemoteStore> NotesService<R> {
    /// Create a service over the given remote store and local mirror.
    pub fn new(remote: R, db: Arc<Database>) -> Self {
        Self { remote, db }
    }

    /// List mirrored notes, newest-update-first.
    pub async fn list(&self) -> Result<Vec<MirrorRow>> {
        MirrorRepository::new(&self.db)
            .fetch_all(&NOTES)
            .await
    }

    /// Fetch one mirrored note by its remote identifier.
    pub async fn get(&self, server_id: &str) -> Result<Option<MirrorRow>> {
        MirrorRepository::new(&self.db)
            .get(&NOTES, server_id)
            .await
    }

    /// Create a note remotely and mirror the result.
    pub async fn create(
        &self,
        title: &str,
        content: Option<&str>,
        user_id: &str,
    ) -> Result<MirrorRow> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("note title cannot be empty".to_string()));
        }

        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::from(title));
        fields.insert("content".to_string(), content.map_or(Value::Null, Value::from));
        fields.insert("user_id".to_string(), Value::from(user_id));

        let record = self.remote.create_record(NOTES.collection, &fields).await?;
        self.mirror(record).await
    }

    /// Update a note remotely and mirror the result.
    pub async fn update(
        &self,
        server_id: &str,
        title: &str,
        content: Option<&str>,
    ) -> Result<MirrorRow> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("note title cannot be empty".to_string()));
        }

        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::from(title));
        fields.insert("content".to_string(), content.map_or(Value::Null, Value::from));

        let record = self
            .remote
            .update_record(NOTES.collection, server_id, &fields)
            .await?;
        self.mirror(record).await
    }

    /// Delete a note remotely, then drop it from the mirror.
    pub async fn delete(&self, server_id: &str) -> Result<()> {
        self.remote.delete_record(NOTES.collection, server_id).await?;
        MirrorRepository::new(&self.db)
            .delete_by_server_id(&NOTES, server_id)
            .await
    }

    async fn mirror(&self, record: crate::models::RemoteRecord) -> Result<MirrorRow> {
        let row = translate::translate(&NOTES, &record)?;
        let repo = MirrorRepository::new(&self.db);
        repo.upsert(&NOTES, &row).await?;
        repo.get(&NOTES, &row.server_id)
            .await?
            .ok_or_else(|| Error::NotFound(row.server_id))
    }
}
