//! Single-flight sync scheduler with trailing-trigger coalescing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::db::Database;
use crate::remote::RemoteStore;
use crate::schema;
use crate::sync::pull;

#[derive(Debug, Default)]
struct GateState {
    running: bool,
    pending: bool,
}

struct SchedulerInner<R> {
    remote: R,
    db: Arc<Database>,
    gate: Mutex<GateState>,
    idle: Notify,
}

/// The sync engine's public entry point.
///
/// At most one reconciliation pass runs at a time. A trigger that arrives
/// while a pass is in flight is coalesced with any others into exactly one
/// follow-up pass after the current one completes; a trigger never blocks
/// its caller.
#[derive(Clone)]
pub struct SyncScheduler<R: RemoteStore> {
    inner: Arc<SchedulerInner<R>>,
}

impl<R: RemoteStore> SyncScheduler<R> {
    /// Create a scheduler over the given remote store and local mirror.
    pub fn new(remote: R, db: Arc<Database>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                remote,
                db,
                gate: Mutex::new(GateState::default()),
                idle: Notify::new(),
            }),
        }
    }

    /// Request a reconciliation pass; fire-and-forget.
    ///
    /// Idle: a pass starts on a background task. Running: the pending flag
    /// is set and the call returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self) {
        {
            let mut gate = lock_gate(&self.inner.gate);
            if gate.running {
                gate.pending = true;
                return;
            }
            gate.running = true;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_until_settled(&inner).await;
        });
    }

    /// Whether no pass is running or pending.
    pub fn is_idle(&self) -> bool {
        let gate = lock_gate(&self.inner.gate);
        !gate.running && !gate.pending
    }

    /// Wait until the scheduler settles into the idle state.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Run passes until no pending trigger remains, then release the gate.
async fn run_until_settled<R: RemoteStore>(inner: &SchedulerInner<R>) {
    loop {
        run_one_pass(inner).await;

        let mut gate = lock_gate(&inner.gate);
        if gate.pending {
            // Triggers received mid-pass coalesce into this single re-run.
            gate.pending = false;
            drop(gate);
            continue;
        }
        gate.running = false;
        drop(gate);
        inner.idle.notify_waiters();
        return;
    }
}

async fn run_one_pass<R: RemoteStore>(inner: &SchedulerInner<R>) {
    if !inner.remote.is_configured() {
        tracing::warn!("Sync skipped: remote store is not configured");
        return;
    }
    if !inner.remote.is_authenticated() {
        tracing::warn!("Sync skipped: not authenticated");
        return;
    }

    let summary = pull::run_pass(&inner.remote, &inner.db, schema::WATCHED_TABLES).await;
    tracing::info!(
        "Sync pass finished: {} tables ok, {} failed, {} created, {} updated, {} deleted",
        summary.tables_synced,
        summary.tables_failed,
        summary.created,
        summary.updated,
        summary.deleted
    );
}

fn lock_gate(gate: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}
