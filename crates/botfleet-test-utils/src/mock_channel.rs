// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel client for deterministic testing.
//!
//! Captures every send, edit, typing refresh, and webhook operation for
//! assertion, and can be told to fail specific operation families with a
//! configurable message and HTTP status.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use botfleet_core::{BotfleetError, ChannelClient};
use tokio::sync::Mutex;

#[derive(Default)]
struct Failure {
    message: String,
    status: Option<u16>,
}

impl Failure {
    fn to_error(&self) -> BotfleetError {
        BotfleetError::Channel {
            message: self.message.clone(),
            status: self.status,
            source: None,
        }
    }
}

/// A mock messaging channel.
///
/// `send_message` returns incrementing message ids so tests can follow a
/// message through edits and persistence.
pub struct MockChannelClient {
    next_message_id: AtomicI64,
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    edited: Arc<Mutex<Vec<(i64, i64, String)>>>,
    typing: Arc<Mutex<usize>>,
    callbacks: Arc<Mutex<Vec<(String, Option<String>)>>>,
    webhooks: Arc<Mutex<Vec<(String, String)>>>,
    send_failure: Arc<Mutex<Option<Failure>>>,
    edit_failure: Arc<Mutex<Option<Failure>>>,
    webhook_failure: Arc<Mutex<Option<Failure>>>,
}

impl MockChannelClient {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI64::new(100),
            sent: Arc::new(Mutex::new(Vec::new())),
            edited: Arc::new(Mutex::new(Vec::new())),
            typing: Arc::new(Mutex::new(0)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            webhooks: Arc::new(Mutex::new(Vec::new())),
            send_failure: Arc::new(Mutex::new(None)),
            edit_failure: Arc::new(Mutex::new(None)),
            webhook_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// All `(chat_id, text)` pairs passed to `send_message`.
    pub async fn sent_messages(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }

    /// All `(chat_id, message_id, text)` triples passed to `edit_message_text`.
    pub async fn edits(&self) -> Vec<(i64, i64, String)> {
        self.edited.lock().await.clone()
    }

    /// Number of typing indicator refreshes sent so far.
    pub async fn typing_count(&self) -> usize {
        *self.typing.lock().await
    }

    /// All answered callbacks.
    pub async fn callbacks(&self) -> Vec<(String, Option<String>)> {
        self.callbacks.lock().await.clone()
    }

    /// Webhook/polling operations as `(operation, bot_id)` pairs, in call
    /// order. Operations: `set`, `delete`, `start_polling`, `stop_polling`.
    pub async fn webhook_calls(&self) -> Vec<(String, String)> {
        self.webhooks.lock().await.clone()
    }

    /// Make every subsequent `send_message` fail.
    pub async fn fail_sends_with(&self, message: &str, status: Option<u16>) {
        *self.send_failure.lock().await = Some(Failure {
            message: message.into(),
            status,
        });
    }

    /// Make every subsequent `edit_message_text` fail.
    pub async fn fail_edits_with(&self, message: &str, status: Option<u16>) {
        *self.edit_failure.lock().await = Some(Failure {
            message: message.into(),
            status,
        });
    }

    /// Make every subsequent webhook/polling operation fail.
    pub async fn fail_webhooks_with(&self, message: &str) {
        *self.webhook_failure.lock().await = Some(Failure {
            message: message.into(),
            status: None,
        });
    }
}

impl Default for MockChannelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelClient for MockChannelClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotfleetError> {
        if let Some(failure) = &*self.send_failure.lock().await {
            return Err(failure.to_error());
        }
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().await.push((chat_id, text.to_string()));
        Ok(id)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), BotfleetError> {
        if let Some(failure) = &*self.edit_failure.lock().await {
            return Err(failure.to_error());
        }
        self.edited
            .lock()
            .await
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn send_typing_indicator(&self, _chat_id: i64) -> Result<(), BotfleetError> {
        *self.typing.lock().await += 1;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), BotfleetError> {
        self.callbacks
            .lock()
            .await
            .push((callback_id.to_string(), text.map(|s| s.to_string())));
        Ok(())
    }

    async fn set_webhook(&self, bot_id: &str) -> Result<(), BotfleetError> {
        self.record_webhook("set", bot_id).await
    }

    async fn delete_webhook(&self, bot_id: &str) -> Result<(), BotfleetError> {
        self.record_webhook("delete", bot_id).await
    }

    async fn start_polling(&self, bot_id: &str) -> Result<(), BotfleetError> {
        self.record_webhook("start_polling", bot_id).await
    }

    async fn stop_polling(&self, bot_id: &str) -> Result<(), BotfleetError> {
        self.record_webhook("stop_polling", bot_id).await
    }
}

impl MockChannelClient {
    async fn record_webhook(&self, operation: &str, bot_id: &str) -> Result<(), BotfleetError> {
        if let Some(failure) = &*self.webhook_failure.lock().await {
            return Err(failure.to_error());
        }
        self.webhooks
            .lock()
            .await
            .push((operation.to_string(), bot_id.to_string()));
        Ok(())
    }
}
