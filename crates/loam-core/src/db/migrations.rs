//! Database migrations
//!
//! Mirror table DDL is derived from the static table schemas; adding a
//! watched table needs no new migration code, only a schema declaration.

use crate::error::Result;
use crate::schema;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: schema version tracking plus one mirror table
/// per watched table schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let result = async {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            (),
        )
        .await?;

        for table in schema::WATCHED_TABLES {
            conn.execute(&table.create_table_sql(), ()).await?;
            for index_sql in table.create_index_sql() {
                conn.execute(&index_sql, ()).await?;
            }
        }

        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
            [CURRENT_VERSION],
        )
        .await?;

        Ok::<(), crate::Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            conn.execute("COMMIT", ()).await?;
            Ok(())
        }
        Err(error) => {
            conn.execute("ROLLBACK", ()).await.ok();
            Err(error)
        }
    }
}
