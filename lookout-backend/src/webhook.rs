//! Discord webhook sink.
//!
//! [`WebhookClient`] spaces out requests; [`StatusBoard`] keeps one message up
//! to date, recreating it when the remembered one is gone.

use std::sync::Arc;
use std::time::Duration;

use lookout_db::KeyValueStore;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{Result, ScanError};
use crate::report::{Embed, WebhookPayload};

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

pub struct WebhookClient {
    http: Client,
    url: String,
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl WebhookClient {
    pub fn new(http: Client, url: impl Into<String>, min_delay: Duration) -> Self {
        Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until at least `min_delay` has passed since the previous request.
    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Post a new message and return its id.
    pub async fn create_message(&self, embed: &Embed) -> Result<String> {
        self.wait_for_slot().await;
        let response = self
            .http
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(&WebhookPayload { embeds: [embed] })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ScanError::from_response(response).await);
        }
        let body = response.bytes().await?;
        let created: CreatedMessage = serde_json::from_slice(&body)?;
        Ok(created.id)
    }

    /// Replace the embed of a message previously created by this webhook.
    pub async fn edit_message(&self, message_id: &str, embed: &Embed) -> Result<()> {
        self.wait_for_slot().await;
        let response = self
            .http
            .patch(format!("{}/messages/{}", self.url, message_id))
            .json(&WebhookPayload { embeds: [embed] })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ScanError::from_response(response).await);
        }
        Ok(())
    }
}

/// Post an alert without waiting for it. Failures are only logged.
pub fn dispatch_alert(webhook: Arc<WebhookClient>, embed: Embed) {
    tokio::spawn(async move {
        if let Err(e) = webhook.create_message(&embed).await {
            tracing::warn!(error = %e, title = %embed.title, "failed to send alert");
        }
    });
}

/// A single webhook message edited in place, its id persisted under `key`.
pub struct StatusBoard<S> {
    webhook: Arc<WebhookClient>,
    store: Arc<S>,
    key: String,
    handle: Option<String>,
}

impl<S: KeyValueStore> StatusBoard<S> {
    /// Restore the remembered message id, if any.
    pub async fn load(webhook: Arc<WebhookClient>, store: Arc<S>, key: impl Into<String>) -> Self {
        let key = key.into();
        let handle = match store.get(&key).await {
            Ok(handle) => handle.filter(|h| !h.trim().is_empty()),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to read message id");
                None
            }
        };
        if let Some(id) = &handle {
            tracing::info!(key = %key, message_id = %id, "message id loaded");
        }
        Self {
            webhook,
            store,
            key,
            handle,
        }
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Edit the remembered message, or create one when there is none or the
    /// remembered one was rejected.
    pub async fn publish(&mut self, embed: &Embed) -> Result<()> {
        if let Some(id) = self.handle.clone() {
            match self.webhook.edit_message(&id, embed).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_client_rejection() => {
                    tracing::warn!(message_id = %id, error = %e, "message not editable, creating a new one");
                    self.handle = None;
                    if let Err(e) = self.store.delete(&self.key).await {
                        tracing::error!(key = %self.key, error = %e, "failed to forget message id");
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let id = self.webhook.create_message(embed).await?;
        tracing::info!(key = %self.key, message_id = %id, "message created");
        self.handle = Some(id.clone());
        if let Err(e) = self.store.set(&self.key, id).await {
            tracing::error!(key = %self.key, error = %e, "failed to persist message id");
        }
        Ok(())
    }
}
