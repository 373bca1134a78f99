//! Remote sync transport
//!
//! Thin HTTP client over the sync service's versioned JSON API. The engine
//! talks to the [`RemoteSync`] trait so tests can substitute an in-memory
//! remote; [`RemoteApiClient`] is the production implementation.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{HistoryEvent, Note, OwnerId, Reminder};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Remote half of the sync engine.
#[allow(async_fn_in_trait)]
pub trait RemoteSync {
    /// Idempotently ensure the owner's profile row exists server-side.
    async fn ensure_profile(&self, owner: &OwnerId) -> Result<()>;

    /// Reminders modified strictly after `since` for the owner.
    async fn reminders_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Reminder>>;

    /// Push a batch of reminders; the server applies its own LWW merge.
    async fn upsert_reminders(&self, records: &[Reminder]) -> Result<()>;

    /// Notes modified strictly after `since` for the owner.
    async fn notes_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Note>>;

    /// Push a batch of notes.
    async fn upsert_notes(&self, records: &[Note]) -> Result<()>;

    /// History events created strictly after `since` for the owner,
    /// regardless of which device recorded them.
    async fn events_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<HistoryEvent>>;

    /// Append a batch of history events. Re-sending an event the server
    /// already holds must be a server-side no-op.
    async fn push_events(&self, events: &[HistoryEvent]) -> Result<()>;
}

/// JSON envelope used by every collection route.
#[derive(Debug, Serialize, Deserialize)]
struct RecordsEnvelope<R> {
    records: Vec<R>,
}

/// HTTP implementation of [`RemoteSync`].
#[derive(Clone)]
pub struct RemoteApiClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl RemoteApiClient {
    /// Build a client for the given API base URL and bearer token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "API base URL must include http:// or https://".to_string(),
            ));
        }

        let token = normalize_text_option(Some(token.into()))
            .ok_or_else(|| Error::InvalidInput("API token must not be empty".to_string()))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::RemoteUnavailable(error.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn fetch_since<R: DeserializeOwned>(
        &self,
        collection: &str,
        owner: &OwnerId,
        since: i64,
    ) -> Result<Vec<R>> {
        let response = self
            .client
            .get(self.url(collection))
            .bearer_auth(&self.token)
            .query(&[("owner_id", owner.as_str()), ("since", &since.to_string())])
            .send()
            .await
            .map_err(|error| Error::RemoteUnavailable(error.to_string()))?;

        let response = Self::check(response).await?;
        let envelope = response
            .json::<RecordsEnvelope<R>>()
            .await
            .map_err(|error| Error::RemoteUnavailable(error.to_string()))?;
        Ok(envelope.records)
    }

    async fn batch_upsert<R: Serialize>(&self, collection: &str, records: &[R]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url(&format!("{collection}:batch-upsert")))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "records": records }))
            .send()
            .await
            .map_err(|error| Error::RemoteUnavailable(error.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}

impl RemoteSync for RemoteApiClient {
    async fn ensure_profile(&self, owner: &OwnerId) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("profiles/{}", owner.as_str())))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|error| Error::RemoteUnavailable(error.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn reminders_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Reminder>> {
        self.fetch_since("reminders", owner, since).await
    }

    async fn upsert_reminders(&self, records: &[Reminder]) -> Result<()> {
        self.batch_upsert("reminders", records).await
    }

    async fn notes_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Note>> {
        self.fetch_since("notes", owner, since).await
    }

    async fn upsert_notes(&self, records: &[Note]) -> Result<()> {
        self.batch_upsert("notes", records).await
    }

    async fn events_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<HistoryEvent>> {
        self.fetch_since("events", owner, since).await
    }

    async fn push_events(&self, events: &[HistoryEvent]) -> Result<()> {
        self.batch_upsert("events", events).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn api_error(status: StatusCode, body: &str) -> Error {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return Error::RemoteUnavailable(format!(
                "{} ({})",
                message.trim(),
                status.as_u16()
            ));
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        Error::RemoteUnavailable(format!("HTTP {}", status.as_u16()))
    } else {
        Error::RemoteUnavailable(format!("{} ({})", trimmed, status.as_u16()))
    }
}
