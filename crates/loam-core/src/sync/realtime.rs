//! Real-time merge: applies individually pushed change events to the
//! mirror, independent of the reconciliation pass.
//!
//! This path is intentionally unsynchronized with the single-flight gate;
//! an event arriving while a table's reconcile transaction is open waits on
//! the database's write gate rather than failing or being dropped.
//! Both paths write the latest-known remote snapshot through the same
//! idempotent upsert/delete primitives, so the mirror converges; the narrow
//! race where a mid-flight pass's deletion detection can undo a concurrent
//! realtime create is a known gap (see DESIGN.md) carried over deliberately.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::{Database, MirrorRepository};
use crate::error::Result;
use crate::remote::{ChangeAction, ChangeEvent, RemoteStore, SubscriptionHandle};
use crate::schema::{TableSchema, WATCHED_TABLES};
use crate::sync::translate;

struct Worker {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

/// Owns one change-stream subscription per watched collection and routes
/// each event to the mirror writer.
pub struct RealtimeManager<R: RemoteStore> {
    remote: R,
    db: Arc<Database>,
    workers: Vec<Worker>,
    subscribed: bool,
}

impl<R: RemoteStore> RealtimeManager<R> {
    /// Create a manager over the given remote store and local mirror.
    pub fn new(remote: R, db: Arc<Database>) -> Self {
        Self {
            remote,
            db,
            workers: Vec::new(),
            subscribed: false,
        }
    }

    /// Whether subscriptions are currently held.
    pub const fn subscribed(&self) -> bool {
        self.subscribed
    }

    /// Open one subscription per watched collection.
    ///
    /// Idempotent: a second call while subscribed is a no-op. A collection
    /// that fails to subscribe is logged and skipped; the others still
    /// subscribe.
    pub async fn subscribe(&mut self) {
        if self.subscribed {
            return;
        }

        for table in WATCHED_TABLES {
            match self.remote.subscribe(table.collection).await {
                Ok(subscription) => {
                    let (events, handle) = subscription.split();
                    let task =
                        tokio::spawn(apply_events(Arc::clone(&self.db), table, events));
                    self.workers.push(Worker { handle, task });
                }
                Err(error) => {
                    tracing::warn!("Failed to subscribe to {}: {error}", table.collection);
                }
            }
        }

        self.subscribed = true;
    }

    /// Close every held subscription.
    ///
    /// A close failure on one handle is logged and does not prevent closing
    /// the rest.
    pub async fn unsubscribe(&mut self) {
        for worker in self.workers.drain(..) {
            let collection = worker.handle.collection().to_string();
            if let Err(error) = worker.handle.close() {
                tracing::warn!("Failed to close subscription to {collection}: {error}");
            }
            if worker.task.await.is_err() {
                tracing::warn!("Event worker for {collection} panicked");
            }
        }
        self.subscribed = false;
    }
}

/// Consume one collection's change events until the stream closes.
async fn apply_events(
    db: Arc<Database>,
    table: &'static TableSchema,
    mut events: mpsc::Receiver<ChangeEvent>,
) {
    while let Some(event) = events.recv().await {
        // One bad event must not block the ones after it.
        if let Err(error) = apply_event(&db, table, &event).await {
            tracing::warn!(
                "Failed to apply {:?} event on {}: {error}",
                event.action,
                table.collection
            );
        }
    }
    tracing::debug!("Event stream for {} ended", table.collection);
}

/// Apply a single change event to the mirror.
async fn apply_event(db: &Database, table: &TableSchema, event: &ChangeEvent) -> Result<()> {
    let repo = MirrorRepository::new(db);
    match event.action {
        ChangeAction::Delete => repo.delete_by_server_id(table, &event.record.id).await,
        ChangeAction::Create | ChangeAction::Update => {
            let row = translate::translate(table, &event.record)?;
            repo.upsert(table, &row).await
        }
    }
}
