// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock alert sink capturing notifications.
//!
//! Performs no deduplication of its own -- it stands in for the raw
//! operator channel, so tests can assert exactly what reached it through
//! the deduplicating wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use botfleet_core::{AlertSink, BotfleetError};
use tokio::sync::Mutex;

/// Captures every notification passed to `notify`.
pub struct MockAlertSink {
    notifications: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// All `(text, dedupe_key)` pairs received so far.
    pub async fn notifications(&self) -> Vec<(String, Option<String>)> {
        self.notifications.lock().await.clone()
    }
}

impl Default for MockAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for MockAlertSink {
    async fn notify(&self, text: &str, dedupe_key: Option<&str>) -> Result<(), BotfleetError> {
        self.notifications
            .lock()
            .await
            .push((text.to_string(), dedupe_key.map(|s| s.to_string())));
        Ok(())
    }
}
