//! PocketBase-backed implementation of the remote store.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::models::RemoteRecord;

use super::sse::SseParser;
use super::{ChangeEvent, RemoteConfig, RemoteError, RemoteResult, RemoteStore, Subscription};

/// Page size for full-list fetches; matches the backend's maximum.
const FETCH_PAGE_SIZE: usize = 500;

/// Buffered change events per subscription before backpressure kicks in.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Auth collection holding user credentials.
const AUTH_COLLECTION: &str = "users";

#[derive(Clone)]
struct AuthState {
    token: String,
    user_id: String,
}

impl fmt::Debug for AuthState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthState")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

struct ClientInner {
    base_url: Option<String>,
    http: reqwest::Client,
    auth: RwLock<Option<AuthState>>,
}

/// HTTP + SSE client for a PocketBase backend.
///
/// Cheap to clone; clones share the credential state.
#[derive(Clone)]
pub struct PocketBaseClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for PocketBaseClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PocketBaseClient")
            .field("base_url", &self.inner.base_url)
            .field("auth", &self.auth_state())
            .finish()
    }
}

impl PocketBaseClient {
    /// Build a client from the given configuration.
    ///
    /// An unconfigured base URL is allowed; every remote call then fails
    /// with [`RemoteError::NotConfigured`] until one is provided.
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let base_url = config.normalized_base_url()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                http: reqwest::Client::builder().build()?,
                auth: RwLock::new(None),
            }),
        })
    }

    /// Authenticate against the users collection with identity + password.
    pub async fn authenticate_with_password(
        &self,
        identity: &str,
        password: &str,
    ) -> RemoteResult<String> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "identity must not be empty".to_string(),
            ));
        }

        let base_url = self.base_url()?;
        let response = self
            .inner
            .http
            .post(format!(
                "{base_url}/api/collections/{AUTH_COLLECTION}/auth-with-password"
            ))
            .json(&json!({ "identity": identity, "password": password }))
            .send()
            .await?;
        let payload: AuthPayload = Self::read_json(response).await?;

        let user_id = payload.record.id.clone();
        *self.auth_mut() = Some(AuthState {
            token: payload.token,
            user_id: user_id.clone(),
        });
        Ok(user_id)
    }

    /// Drop the held credential.
    pub fn clear_authentication(&self) {
        *self.auth_mut() = None;
    }

    /// Identifier of the authenticated user, when authenticated.
    pub fn authenticated_user_id(&self) -> Option<String> {
        self.auth_state().map(|auth| auth.user_id)
    }

    fn base_url(&self) -> RemoteResult<&str> {
        self.inner
            .base_url
            .as_deref()
            .ok_or(RemoteError::NotConfigured)
    }

    fn auth_state(&self) -> Option<AuthState> {
        self.inner
            .auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn auth_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<AuthState>> {
        self.inner
            .auth
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut request = self.inner.http.request(method, url);
        if let Some(auth) = self.auth_state() {
            request = request.header("Authorization", auth.token);
        }
        request
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> RemoteResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<T>().await?)
    }

    async fn read_empty(response: reqwest::Response) -> RemoteResult<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    /// Replace the realtime subscription set for an established client id.
    async fn set_realtime_subscriptions(
        &self,
        client_id: &str,
        subscriptions: &[String],
    ) -> RemoteResult<()> {
        let base_url = self.base_url()?;
        let response = self
            .request(Method::POST, format!("{base_url}/api/realtime"))
            .json(&json!({ "clientId": client_id, "subscriptions": subscriptions }))
            .send()
            .await?;
        Self::read_empty(response).await
    }
}

impl RemoteStore for PocketBaseClient {
    fn is_configured(&self) -> bool {
        self.inner.base_url.is_some()
    }

    fn is_authenticated(&self) -> bool {
        self.auth_state().is_some()
    }

    async fn fetch_all(&self, collection: &str) -> RemoteResult<Vec<RemoteRecord>> {
        let base_url = self.base_url()?;
        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            let response = self
                .request(
                    Method::GET,
                    format!("{base_url}/api/collections/{collection}/records"),
                )
                .query(&[
                    ("page", page.to_string()),
                    ("perPage", FETCH_PAGE_SIZE.to_string()),
                    ("sort", "-updated".to_string()),
                    ("skipTotal", "1".to_string()),
                ])
                .send()
                .await?;
            let payload: ListPayload = Self::read_json(response).await?;

            let count = payload.items.len();
            records.extend(payload.items);
            if count < FETCH_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    async fn create_record(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> RemoteResult<RemoteRecord> {
        let base_url = self.base_url()?;
        let response = self
            .request(
                Method::POST,
                format!("{base_url}/api/collections/{collection}/records"),
            )
            .json(fields)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn update_record(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> RemoteResult<RemoteRecord> {
        let base_url = self.base_url()?;
        let response = self
            .request(
                Method::PATCH,
                format!("{base_url}/api/collections/{collection}/records/{id}"),
            )
            .json(fields)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn delete_record(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let base_url = self.base_url()?;
        let response = self
            .request(
                Method::DELETE,
                format!("{base_url}/api/collections/{collection}/records/{id}"),
            )
            .send()
            .await?;
        Self::read_empty(response).await
    }

    async fn subscribe(&self, collection: &str) -> RemoteResult<Subscription> {
        let base_url = self.base_url()?;

        // Establish the SSE connection eagerly so connect failures surface
        // to the caller instead of dying silently inside the reader task.
        let response = self
            .request(Method::GET, format!("{base_url}/api/realtime"))
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run_change_stream(
            self.clone(),
            collection.to_string(),
            response,
            events_tx,
            shutdown_rx,
        ));

        Ok(Subscription::new(collection, events_rx, shutdown_tx))
    }
}

/// Reader loop for one collection's SSE stream.
///
/// Handles the connect handshake (the server announces a client id, we POST
/// the topic list back), then forwards change events until shutdown or
/// stream end. Exiting drops the sender, which ends the consumer side.
async fn run_change_stream(
    client: PocketBaseClient,
    collection: String,
    response: reqwest::Response,
    events_tx: mpsc::Sender<ChangeEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let topic = format!("{collection}/*");
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut client_id: Option<String> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                if let Some(id) = client_id.as_deref() {
                    if let Err(error) = client.set_realtime_subscriptions(id, &[]).await {
                        tracing::debug!("Failed to clear realtime subscriptions for {collection}: {error}");
                    }
                }
                tracing::debug!("Realtime stream for {collection} closed");
                return;
            }
            chunk = stream.next() => {
                let bytes = match chunk {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(error)) => {
                        tracing::warn!("Realtime stream for {collection} failed: {error}");
                        return;
                    }
                    None => {
                        tracing::warn!("Realtime stream for {collection} ended");
                        return;
                    }
                };

                for message in parser.feed(&bytes) {
                    if message.event == "PB_CONNECT" {
                        let connect: ConnectPayload = match serde_json::from_str(&message.data) {
                            Ok(connect) => connect,
                            Err(error) => {
                                tracing::warn!("Invalid realtime connect payload for {collection}: {error}");
                                return;
                            }
                        };
                        if let Err(error) = client
                            .set_realtime_subscriptions(&connect.client_id, &[topic.clone()])
                            .await
                        {
                            tracing::warn!("Failed to subscribe {collection}: {error}");
                            return;
                        }
                        client_id = Some(connect.client_id);
                    } else if message.event == topic || message.event == collection {
                        match serde_json::from_str::<ChangeEvent>(&message.data) {
                            Ok(event) => {
                                if events_tx.send(event).await.is_err() {
                                    // Consumer unsubscribed.
                                    return;
                                }
                            }
                            Err(error) => {
                                tracing::warn!("Invalid change event on {collection}: {error}");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    token: String,
    record: RemoteRecord,
}

#[derive(Debug, Deserialize)]
struct ListPayload {
    items: Vec<RemoteRecord>,
}

#[derive(Debug, Deserialize)]
struct ConnectPayload {
    #[serde(rename = "clientId")]
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Trimmed, bounded body excerpt for error messages.
fn compact_body(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_body(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
