//! Mirror repository: upserts, deletions, and whole-table reconciliation
//! against the local mirror, keyed by the remote `server_id`.

use std::collections::{HashMap, HashSet};

use libsql::{Connection, Value};

use crate::error::{Error, Result};
use crate::models::{FieldValue, MirrorRow, TranslatedRow};
use crate::schema::{FieldType, TableSchema};

use super::connection::Database;

/// Counters for one table's reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Rows created because the remote record had no local counterpart
    pub created: usize,
    /// Rows overwritten in place
    pub updated: usize,
    /// Rows removed because the full remote fetch no longer contained them
    pub deleted: usize,
}

/// Write/read access to one mirror table.
///
/// Every mutation runs inside its own scoped transaction; the transaction is
/// rolled back on any exit path that does not commit. Mutations hold the
/// database's write gate, so a write that arrives while another transaction
/// is open (a realtime event during a reconciliation, or the reverse) waits
/// for it instead of failing.
pub struct MirrorRepository<'a> {
    db: &'a Database,
}

impl<'a> MirrorRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite the row for `row.server_id`.
    ///
    /// Overwrites every translated field except the local row identity.
    /// Exactly one row per `server_id` exists after the call.
    pub async fn upsert(&self, table: &TableSchema, row: &TranslatedRow) -> Result<()> {
        let _write = self.db.write_lock().await;
        let tx = self.db.connection().transaction().await?;
        match find_row_id(&tx, table, &row.server_id).await? {
            Some(row_id) => update_row(&tx, table, row, row_id).await?,
            None => insert_row(&tx, table, row).await?,
        }
        tx.commit().await?;
        Ok(())
    }

    /// Permanently delete the row for `server_id`, if present.
    ///
    /// A missing row is a no-op, not an error; deletes are idempotent.
    pub async fn delete_by_server_id(&self, table: &TableSchema, server_id: &str) -> Result<()> {
        let _write = self.db.write_lock().await;
        let tx = self.db.connection().transaction().await?;
        tx.execute(
            &format!("DELETE FROM {} WHERE server_id = ?", table.table),
            [server_id],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Reconcile one table against a full remote snapshot, atomically.
    ///
    /// Every translated record is upserted; every local row whose
    /// `server_id` was not part of the snapshot is permanently deleted.
    /// Either the whole table's reconciliation lands or none of it does.
    pub async fn reconcile(
        &self,
        table: &TableSchema,
        rows: &[TranslatedRow],
    ) -> Result<ReconcileStats> {
        let _write = self.db.write_lock().await;
        let tx = self.db.connection().transaction().await?;
        let stats = reconcile_in(&tx, table, rows).await?;
        tx.commit().await?;
        Ok(stats)
    }

    /// Fetch every row of the table, newest-update-first.
    pub async fn fetch_all(&self, table: &TableSchema) -> Result<Vec<MirrorRow>> {
        let sql = format!(
            "SELECT id, server_id, created_at, updated_at{} FROM {} ORDER BY updated_at DESC, id DESC",
            business_column_list(table),
            table.table,
        );
        let mut rows = self.db.connection().query(&sql, ()).await?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().await? {
            result.push(parse_row(table, &row)?);
        }
        Ok(result)
    }

    /// Fetch the row for `server_id`, if present.
    pub async fn get(&self, table: &TableSchema, server_id: &str) -> Result<Option<MirrorRow>> {
        let sql = format!(
            "SELECT id, server_id, created_at, updated_at{} FROM {} WHERE server_id = ?",
            business_column_list(table),
            table.table,
        );
        let mut rows = self.db.connection().query(&sql, [server_id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_row(table, &row)?)),
            None => Ok(None),
        }
    }
}

async fn reconcile_in(
    conn: &Connection,
    table: &TableSchema,
    rows: &[TranslatedRow],
) -> Result<ReconcileStats> {
    let mut local_by_server_id: HashMap<String, i64> = HashMap::new();
    let mut local_rows = conn
        .query(
            &format!("SELECT id, server_id FROM {}", table.table),
            (),
        )
        .await?;
    while let Some(row) = local_rows.next().await? {
        let row_id: i64 = row.get(0)?;
        let server_id: String = row.get(1)?;
        local_by_server_id.insert(server_id, row_id);
    }

    let mut stats = ReconcileStats::default();
    let mut received: HashSet<&str> = HashSet::new();

    for row in rows {
        received.insert(row.server_id.as_str());
        if let Some(&row_id) = local_by_server_id.get(&row.server_id) {
            update_row(conn, table, row, row_id).await?;
            stats.updated += 1;
        } else {
            insert_row(conn, table, row).await?;
            stats.created += 1;
        }
    }

    // A record absent from a full remote fetch is presumed deleted remotely.
    for (server_id, row_id) in &local_by_server_id {
        if !received.contains(server_id.as_str()) {
            conn.execute(
                &format!("DELETE FROM {} WHERE id = ?", table.table),
                [*row_id],
            )
            .await?;
            stats.deleted += 1;
        }
    }

    Ok(stats)
}

async fn find_row_id(
    conn: &Connection,
    table: &TableSchema,
    server_id: &str,
) -> Result<Option<i64>> {
    let mut rows = conn
        .query(
            &format!("SELECT id FROM {} WHERE server_id = ?", table.table),
            [server_id],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

async fn insert_row(conn: &Connection, table: &TableSchema, row: &TranslatedRow) -> Result<()> {
    let placeholders = std::iter::repeat("?")
        .take(3 + table.columns.len())
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} (server_id, created_at, updated_at{}) VALUES ({placeholders})",
        table.table,
        business_column_list(table),
    );
    conn.execute(&sql, row_params(row)).await?;
    Ok(())
}

async fn update_row(
    conn: &Connection,
    table: &TableSchema,
    row: &TranslatedRow,
    row_id: i64,
) -> Result<()> {
    let mut assignments = vec![
        "server_id = ?".to_string(),
        "created_at = ?".to_string(),
        "updated_at = ?".to_string(),
    ];
    for column in table.columns {
        assignments.push(format!("{} = ?", column.name));
    }
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        table.table,
        assignments.join(", "),
    );

    let mut params = row_params(row);
    params.push(Value::Integer(row_id));
    conn.execute(&sql, params).await?;
    Ok(())
}

/// Leading-comma column list for the table's business fields.
fn business_column_list(table: &TableSchema) -> String {
    table
        .columns
        .iter()
        .map(|column| format!(", {}", column.name))
        .collect()
}

fn row_params(row: &TranslatedRow) -> Vec<Value> {
    let mut params = vec![
        Value::Text(row.server_id.clone()),
        Value::Integer(row.created_at),
        Value::Integer(row.updated_at),
    ];
    params.extend(row.fields.iter().map(|(_, value)| Value::from(value)));
    params
}

fn parse_row(table: &TableSchema, row: &libsql::Row) -> Result<MirrorRow> {
    let mut fields = Vec::with_capacity(table.columns.len());
    for (offset, column) in table.columns.iter().enumerate() {
        let index = i32::try_from(4 + offset)
            .map_err(|_| Error::Database("column index out of range".to_string()))?;
        let value = match row.get_value(index)? {
            Value::Null => FieldValue::Null,
            Value::Text(text) => FieldValue::Text(text),
            Value::Integer(value) if column.field_type == FieldType::Boolean => {
                FieldValue::Boolean(value != 0)
            }
            Value::Integer(value) => FieldValue::Integer(value),
            Value::Real(value) => FieldValue::Real(value),
            Value::Blob(_) => {
                return Err(Error::Database(format!(
                    "unexpected blob in column {}.{}",
                    table.table, column.name
                )))
            }
        };
        fields.push((column.name, value));
    }

    Ok(MirrorRow {
        row_id: row.get(0)?,
        server_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        fields,
    })
}
