//! Remote API client.
//!
//! One HTTP request per queued mutation: `create` → POST, `update` → PUT,
//! `delete` → DELETE, `upload` → multipart POST with the photo bytes.
//! Requests carry `Authorization: Bearer <token>` when the session provider
//! has one; non-2xx responses are read as text for the error message.

use crate::error::{SyncError, SyncResult};
use crate::session::SessionProvider;
use async_trait::async_trait;
use fieldcite_types::{EntityId, EntityKind, PhotoKind};
use reqwest::multipart;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the central server.
    pub base_url: String,
    /// Per-entity-kind request paths. A kind missing here is a permanent
    /// failure for items of that kind, never an abort of the whole batch.
    pub endpoints: HashMap<EntityKind, String>,
    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert(EntityKind::Ticket, "/api/tickets".to_string());
        endpoints.insert(EntityKind::Photo, "/api/photos".to_string());
        endpoints.insert(EntityKind::Payment, "/api/payments".to_string());
        Self {
            base_url: "http://localhost:8080".to_string(),
            endpoints,
            timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    fn endpoint(&self, kind: EntityKind) -> SyncResult<String> {
        self.endpoints
            .get(&kind)
            .map(|path| format!("{}{}", self.base_url, path))
            .ok_or(SyncError::EndpointNotConfigured(kind))
    }
}

/// Server acknowledgment of a delivered mutation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteAck {
    /// Public URL of an uploaded file, when the server returns one.
    pub url: Option<String>,
}

/// A photo upload resolved from local storage.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub ticket_id: EntityId,
    pub photo_kind: PhotoKind,
}

/// The remote mutation endpoints the engine replays against.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create(&self, kind: EntityKind, body: &Value) -> SyncResult<RemoteAck>;

    async fn update(
        &self,
        kind: EntityKind,
        entity_id: &EntityId,
        body: &Value,
    ) -> SyncResult<RemoteAck>;

    async fn delete(&self, kind: EntityKind, entity_id: &EntityId) -> SyncResult<RemoteAck>;

    async fn upload(
        &self,
        kind: EntityKind,
        entity_id: &EntityId,
        upload: Upload,
    ) -> SyncResult<RemoteAck>;
}

/// HTTP implementation over the central server's REST API.
pub struct HttpRemoteApi {
    client: Client,
    config: RemoteConfig,
    session: Arc<dyn SessionProvider>,
}

impl HttpRemoteApi {
    pub fn new(config: RemoteConfig, session: Arc<dyn SessionProvider>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            config,
            session,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn handle(&self, response: Response) -> SyncResult<RemoteAck> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Http { status, body });
        }
        // Acks without a JSON body (or without a url field) are still acks.
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}

fn request_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else {
        SyncError::Network(format!("request failed: {err}"))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create(&self, kind: EntityKind, body: &Value) -> SyncResult<RemoteAck> {
        let url = self.config.endpoint(kind)?;
        debug!("POST {url}");
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        self.handle(response).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        entity_id: &EntityId,
        body: &Value,
    ) -> SyncResult<RemoteAck> {
        let url = format!("{}/{}", self.config.endpoint(kind)?, entity_id);
        debug!("PUT {url}");
        let response = self
            .authorize(self.client.put(&url))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        self.handle(response).await
    }

    async fn delete(&self, kind: EntityKind, entity_id: &EntityId) -> SyncResult<RemoteAck> {
        let url = format!("{}/{}", self.config.endpoint(kind)?, entity_id);
        debug!("DELETE {url}");
        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(request_error)?;
        self.handle(response).await
    }

    async fn upload(
        &self,
        kind: EntityKind,
        _entity_id: &EntityId,
        upload: Upload,
    ) -> SyncResult<RemoteAck> {
        let url = format!("{}/upload", self.config.endpoint(kind)?);
        debug!("POST {url} ({} bytes)", upload.bytes.len());

        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| SyncError::Network(format!("invalid mime type: {e}")))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("ticketId", upload.ticket_id.to_string())
            .text("type", upload.photo_kind.as_str());

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;
        self.handle(response).await
    }
}
