//! End-to-end engine tests against an in-process fake remote store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot, Semaphore};

use loam_core::db::Database;
use loam_core::models::{FieldValue, RemoteRecord};
use loam_core::remote::{
    ChangeAction, ChangeEvent, RemoteError, RemoteResult, RemoteStore, Subscription,
};
use loam_core::schema::{NOTES, WATCHED_TABLES};
use loam_core::services::NotesService;
use loam_core::sync::{run_pass, RealtimeManager, SyncScheduler};

// ---------------------------------------------------------------------------
// Fake remote store
// ---------------------------------------------------------------------------

struct FakeInner {
    authenticated: AtomicBool,
    records: Mutex<HashMap<String, Vec<RemoteRecord>>>,
    fetch_calls: AtomicUsize,
    fetch_gate: Semaphore,
    next_id: AtomicUsize,
    subscriptions: Mutex<HashMap<String, mpsc::Sender<ChangeEvent>>>,
}

#[derive(Clone)]
struct FakeRemote {
    inner: Arc<FakeInner>,
}

impl FakeRemote {
    /// Fake with no fetch gating: passes complete immediately.
    fn new() -> Self {
        Self::with_gated_fetches(usize::MAX >> 4)
    }

    /// Fake whose `fetch_all` consumes one semaphore permit per call, so a
    /// test can hold a pass open while more triggers arrive.
    fn with_gated_fetches(permits: usize) -> Self {
        Self {
            inner: Arc::new(FakeInner {
                authenticated: AtomicBool::new(true),
                records: Mutex::new(HashMap::new()),
                fetch_calls: AtomicUsize::new(0),
                fetch_gate: Semaphore::new(permits),
                next_id: AtomicUsize::new(1),
                subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn set_authenticated(&self, value: bool) {
        self.inner.authenticated.store(value, Ordering::SeqCst);
    }

    fn fetch_calls(&self) -> usize {
        self.inner.fetch_calls.load(Ordering::SeqCst)
    }

    fn release_fetches(&self, count: usize) {
        self.inner.fetch_gate.add_permits(count);
    }

    fn put_record(&self, collection: &str, record: RemoteRecord) {
        let mut records = self.inner.records.lock().unwrap();
        let list = records.entry(collection.to_string()).or_default();
        list.retain(|existing| existing.id != record.id);
        list.push(record);
    }

    fn remove_record(&self, collection: &str, id: &str) {
        let mut records = self.inner.records.lock().unwrap();
        if let Some(list) = records.get_mut(collection) {
            list.retain(|existing| existing.id != id);
        }
    }

    fn record_count(&self, collection: &str) -> usize {
        self.inner
            .records
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().unwrap().len()
    }

    async fn push_event(&self, collection: &str, action: ChangeAction, record: RemoteRecord) {
        let sender = self
            .inner
            .subscriptions
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .expect("no subscription for collection");
        sender.send(ChangeEvent { action, record }).await.unwrap();
    }
}

impl RemoteStore for FakeRemote {
    fn is_configured(&self) -> bool {
        true
    }

    fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    async fn fetch_all(&self, collection: &str) -> RemoteResult<Vec<RemoteRecord>> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.inner.fetch_gate.acquire().await.unwrap();
        permit.forget();

        let records = self.inner.records.lock().unwrap();
        Ok(records.get(collection).cloned().unwrap_or_default())
    }

    async fn create_record(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> RemoteResult<RemoteRecord> {
        let id = format!("r{}", self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let record = RemoteRecord {
            id,
            created: "2024-06-01T00:00:00Z".to_string(),
            updated: "2024-06-01T00:00:00Z".to_string(),
            fields: fields.clone(),
            ..RemoteRecord::default()
        };
        self.put_record(collection, record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> RemoteResult<RemoteRecord> {
        let mut records = self.inner.records.lock().unwrap();
        let list = records
            .get_mut(collection)
            .ok_or_else(|| RemoteError::Api("missing collection".to_string()))?;
        let record = list
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| RemoteError::Api("missing record".to_string()))?;
        for (key, value) in fields {
            record.fields.insert(key.clone(), value.clone());
        }
        record.updated = "2024-06-02T00:00:00Z".to_string();
        Ok(record.clone())
    }

    async fn delete_record(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.remove_record(collection, id);
        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> RemoteResult<Subscription> {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .insert(collection.to_string(), events_tx);

        // On close, drop the stored sender so the consumer's stream ends.
        let inner = Arc::clone(&self.inner);
        let collection_name = collection.to_string();
        tokio::spawn(async move {
            let _ = shutdown_rx.await;
            inner.subscriptions.lock().unwrap().remove(&collection_name);
        });

        Ok(Subscription::new(collection, events_rx, shutdown_tx))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn note_record(id: &str, title: &str, updated: &str) -> RemoteRecord {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "updated": updated,
        "user_id": "u1"
    }))
    .unwrap()
}

async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Reconciliation pass
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn pull_then_remote_delete_converges() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = NotesService::new(remote.clone(), Arc::clone(&db));

    remote.put_record("notes", note_record("a", "A", "2024-01-01T00:00:00Z"));

    let summary = run_pass(&remote, &db, WATCHED_TABLES).await;
    assert_eq!(summary.tables_synced, 1);
    assert_eq!(summary.created, 1);

    let rows = service.list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].server_id, "a");
    assert_eq!(rows[0].field("title").and_then(FieldValue::as_text), Some("A"));
    assert_eq!(rows[0].updated_at, 1_704_067_200_000);

    // Remote deletes the record; the next full pass mirrors the deletion.
    remote.remove_record("notes", "a");
    let summary = run_pass(&remote, &db, WATCHED_TABLES).await;
    assert_eq!(summary.deleted, 1);
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_pull_updates_in_place() {
    let remote = FakeRemote::new();
    let db = Database::open_in_memory().await.unwrap();

    remote.put_record("notes", note_record("x", "first", "2024-01-01T00:00:00Z"));
    run_pass(&remote, &db, WATCHED_TABLES).await;

    remote.put_record("notes", note_record("x", "second", "2024-01-02T00:00:00Z"));
    let summary = run_pass(&remote, &db, WATCHED_TABLES).await;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 0);

    let service = NotesService::new(remote, Arc::new(db));
    let rows = service.list().await.unwrap();
    assert_eq!(rows.len(), 1, "upsert must never duplicate a server_id");
    assert_eq!(
        rows[0].field("title").and_then(FieldValue::as_text),
        Some("second")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_pull_is_idempotent() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = NotesService::new(remote.clone(), Arc::clone(&db));

    remote.put_record("notes", note_record("a", "A", "2024-01-01T00:00:00Z"));
    remote.put_record("notes", note_record("b", "B", "2024-01-02T00:00:00Z"));

    run_pass(&remote, &db, WATCHED_TABLES).await;
    let first = service.list().await.unwrap();

    // No intervening remote change: the second run must be a no-op.
    let summary = run_pass(&remote, &db, WATCHED_TABLES).await;
    assert_eq!(summary.created, 0);
    assert_eq!(summary.deleted, 0);

    let second = service.list().await.unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn rapid_triggers_coalesce_into_one_follow_up_pass() {
    let remote = FakeRemote::with_gated_fetches(0);
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let scheduler = SyncScheduler::new(remote.clone(), db);

    scheduler.trigger();
    let r = &remote;
    assert!(
        eventually(move || async move { r.fetch_calls() == 1 }).await,
        "first pass never started"
    );

    // Three triggers while the first pass is held open.
    scheduler.trigger();
    scheduler.trigger();
    scheduler.trigger();

    remote.release_fetches(16);
    scheduler.wait_until_idle().await;

    assert_eq!(remote.fetch_calls(), 2, "expected exactly one follow-up pass");
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthenticated_trigger_skips_cleanly() {
    let remote = FakeRemote::new();
    remote.set_authenticated(false);
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let scheduler = SyncScheduler::new(remote.clone(), db);

    scheduler.trigger();
    scheduler.wait_until_idle().await;

    assert_eq!(remote.fetch_calls(), 0);
    assert!(scheduler.is_idle());

    // Authenticating later makes the next trigger work normally.
    remote.set_authenticated(true);
    scheduler.trigger();
    scheduler.wait_until_idle().await;
    assert_eq!(remote.fetch_calls(), 1);
}

// ---------------------------------------------------------------------------
// Real-time merge
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn realtime_events_apply_without_a_pass() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = NotesService::new(remote.clone(), Arc::clone(&db));

    let mut realtime = RealtimeManager::new(remote.clone(), Arc::clone(&db));
    realtime.subscribe().await;
    assert!(realtime.subscribed());

    let record = note_record("x", "pushed", "2024-03-01T00:00:00Z");
    remote
        .push_event("notes", ChangeAction::Create, record.clone())
        .await;
    let s = &service;
    assert!(
        eventually(move || async move { s.get("x").await.unwrap().is_some() }).await,
        "create event never reached the mirror"
    );

    // Delete independence: no reconciliation pass has run at all.
    remote.push_event("notes", ChangeAction::Delete, record).await;
    assert!(
        eventually(move || async move { s.get("x").await.unwrap().is_none() }).await,
        "delete event never reached the mirror"
    );

    realtime.unsubscribe().await;
    assert!(!realtime.subscribed());
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_event_does_not_block_later_events() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = NotesService::new(remote.clone(), Arc::clone(&db));

    let mut realtime = RealtimeManager::new(remote.clone(), Arc::clone(&db));
    realtime.subscribe().await;

    // Unknown business field: translation rejects it, the stream lives on.
    let bad: RemoteRecord = serde_json::from_value(json!({
        "id": "bad",
        "title": "B",
        "rank": 7
    }))
    .unwrap();
    remote.push_event("notes", ChangeAction::Create, bad).await;

    let good = note_record("good", "G", "2024-03-01T00:00:00Z");
    remote.push_event("notes", ChangeAction::Create, good).await;

    let s = &service;
    assert!(
        eventually(move || async move { s.get("good").await.unwrap().is_some() }).await,
        "good event was blocked by the bad one"
    );
    assert!(service.get("bad").await.unwrap().is_none());

    realtime.unsubscribe().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn subscribe_is_idempotent() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());

    let mut realtime = RealtimeManager::new(remote.clone(), Arc::clone(&db));
    realtime.subscribe().await;
    realtime.subscribe().await;

    assert_eq!(remote.subscription_count(), 1);

    realtime.unsubscribe().await;
    let r = &remote;
    assert!(
        eventually(move || async move { r.subscription_count() == 0 }).await,
        "unsubscribe did not close the stream"
    );
}

// ---------------------------------------------------------------------------
// Notes service (remote-first CRUD, mirrored locally)
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn notes_service_mirrors_remote_crud() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = NotesService::new(remote.clone(), db);

    let created = service.create("shopping", Some("milk"), "u1").await.unwrap();
    assert_eq!(remote.record_count(NOTES.collection), 1);
    assert_eq!(
        created.field("content").and_then(FieldValue::as_text),
        Some("milk")
    );

    let updated = service
        .update(&created.server_id, "shopping", None)
        .await
        .unwrap();
    assert_eq!(updated.row_id, created.row_id);
    assert!(updated.field("content").unwrap().is_null());

    service.delete(&created.server_id).await.unwrap();
    assert_eq!(remote.record_count(NOTES.collection), 0);
    assert!(service.get(&created.server_id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn notes_service_rejects_empty_title() {
    let remote = FakeRemote::new();
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = NotesService::new(remote.clone(), db);

    assert!(service.create("   ", None, "u1").await.is_err());
    assert_eq!(remote.record_count(NOTES.collection), 0);
}
