//! Full-reconciliation pass: pull each watched collection's complete remote
//! state and diff it against the local mirror.

use crate::db::{Database, MirrorRepository, ReconcileStats};
use crate::error::Result;
use crate::remote::RemoteStore;
use crate::schema::TableSchema;
use crate::sync::translate;

/// Aggregate outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Tables reconciled successfully
    pub tables_synced: usize,
    /// Tables whose reconciliation failed and was skipped
    pub tables_failed: usize,
    /// Rows created across all tables
    pub created: usize,
    /// Rows overwritten across all tables
    pub updated: usize,
    /// Rows deleted across all tables
    pub deleted: usize,
}

/// Run one full reconciliation pass over `tables`, in order.
///
/// Tables are processed independently: a failure on one (remote fetch,
/// translation, local write) is logged at warn and does not abort the
/// rest. Failures never propagate; the summary records them.
pub async fn run_pass<R: RemoteStore>(
    remote: &R,
    db: &Database,
    tables: &[TableSchema],
) -> PassSummary {
    let mut summary = PassSummary::default();

    for table in tables {
        match sync_table(remote, db, table).await {
            Ok(stats) => {
                tracing::debug!(
                    "Reconciled {}: {} created, {} updated, {} deleted",
                    table.table,
                    stats.created,
                    stats.updated,
                    stats.deleted
                );
                summary.tables_synced += 1;
                summary.created += stats.created;
                summary.updated += stats.updated;
                summary.deleted += stats.deleted;
            }
            Err(error) => {
                tracing::warn!("Failed to reconcile {}: {error}", table.table);
                summary.tables_failed += 1;
            }
        }
    }

    summary
}

/// Reconcile a single table against a full remote snapshot.
///
/// All records are translated before the write transaction starts, so a
/// translation failure can never leave deletion detection running against a
/// partially translated snapshot.
async fn sync_table<R: RemoteStore>(
    remote: &R,
    db: &Database,
    table: &TableSchema,
) -> Result<ReconcileStats> {
    let records = remote.fetch_all(table.collection).await?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        rows.push(translate::translate(table, record)?);
    }

    MirrorRepository::new(db).reconcile(table, &rows).await
}
