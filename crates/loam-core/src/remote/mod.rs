//! Remote store collaborator: the seam the sync engine consumes the
//! authoritative backend through.
//!
//! The engine never sees transport details; it asks for full collection
//! snapshots, single-record mutations, and a change-event subscription.

mod pocketbase;
mod sse;

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::models::RemoteRecord;
use crate::util::normalize_text_option;

pub use pocketbase::PocketBaseClient;

/// Errors surfaced by a remote store implementation.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No base URL configured; a normal "not configured yet" condition
    #[error("Remote store is not configured")]
    NotConfigured,
    /// No valid credential held
    #[error("Remote store has no valid authentication")]
    NotAuthenticated,
    /// Invalid remote configuration
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    /// Transport failure
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The remote API rejected the request
    #[error("Remote API error: {0}")]
    Api(String),
    /// The remote returned a payload we could not interpret
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    /// The subscription's change stream is no longer running
    #[error("Subscription to {0} is closed")]
    SubscriptionClosed(String),
}

/// Result type alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Connection settings for the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the remote store (e.g. `https://pb.example.com`)
    pub base_url: Option<String>,
}

impl RemoteConfig {
    /// Create a configuration pointing at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }

    /// Check if a base URL is configured.
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Normalized base URL, validated to be HTTP(S) and stripped of any
    /// trailing slash. `Ok(None)` when no URL is configured.
    pub fn normalized_base_url(&self) -> RemoteResult<Option<String>> {
        let Some(url) = normalize_text_option(self.base_url.clone()) else {
            return Ok(None);
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RemoteError::InvalidConfiguration(
                "base URL must include http:// or https://".to_string(),
            ));
        }
        Ok(Some(url.trim_end_matches('/').to_string()))
    }
}

/// Action carried by one change-stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// A record was created
    Create,
    /// A record was deleted
    Delete,
    /// A record was updated (also the catch-all for unknown actions)
    #[serde(other)]
    Update,
}

/// One pushed change event from the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the record
    pub action: ChangeAction,
    /// The record as of the event
    pub record: RemoteRecord,
}

/// An open change-stream subscription for one collection.
pub struct Subscription {
    collection: String,
    events: mpsc::Receiver<ChangeEvent>,
    shutdown: oneshot::Sender<()>,
}

impl Subscription {
    /// Assemble a subscription from its parts.
    ///
    /// `events` delivers the change stream; dropping or signalling
    /// `shutdown` must stop the producer.
    pub fn new(
        collection: impl Into<String>,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            collection: collection.into(),
            events,
            shutdown,
        }
    }

    /// The collection this subscription covers.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Split into the event stream and the closable handle.
    pub fn split(self) -> (mpsc::Receiver<ChangeEvent>, SubscriptionHandle) {
        (
            self.events,
            SubscriptionHandle {
                collection: self.collection,
                shutdown: self.shutdown,
            },
        )
    }
}

/// Closable handle for an open subscription.
pub struct SubscriptionHandle {
    collection: String,
    shutdown: oneshot::Sender<()>,
}

impl SubscriptionHandle {
    /// The collection this handle's subscription covers.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Close the subscription.
    ///
    /// Fails only when the producer already went away on its own.
    pub fn close(self) -> RemoteResult<()> {
        self.shutdown
            .send(())
            .map_err(|()| RemoteError::SubscriptionClosed(self.collection))
    }
}

/// The authoritative backend, as consumed by the sync engine and by
/// application-level CRUD.
pub trait RemoteStore: Clone + Send + Sync + 'static {
    /// Whether a remote endpoint is configured at all.
    fn is_configured(&self) -> bool;

    /// Whether the currently held credential is valid.
    fn is_authenticated(&self) -> bool;

    /// Fetch the complete record set of a collection, newest-update-first.
    fn fetch_all(
        &self,
        collection: &str,
    ) -> impl Future<Output = RemoteResult<Vec<RemoteRecord>>> + Send;

    /// Create one record and return the authoritative result.
    fn create_record(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> impl Future<Output = RemoteResult<RemoteRecord>> + Send;

    /// Update one record and return the authoritative result.
    fn update_record(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> impl Future<Output = RemoteResult<RemoteRecord>> + Send;

    /// Delete one record.
    fn delete_record(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Subscribe to every event type of a collection's change stream.
    fn subscribe(
        &self,
        collection: &str,
    ) -> impl Future<Output = RemoteResult<Subscription>> + Send;
}
