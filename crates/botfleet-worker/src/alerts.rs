// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplicating wrapper around the operator alert sink.
//!
//! Repeated failures of one underlying cause produce one notification per
//! rolling window, keyed by the caller-supplied dedupe key. Alerts without
//! a key always pass through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use botfleet_core::{AlertSink, BotfleetError};
use dashmap::DashMap;
use tracing::debug;

/// Suppresses repeat notifications per dedupe key within a rolling window.
pub struct DedupedAlerts {
    inner: Arc<dyn AlertSink>,
    window: Duration,
    last_sent: DashMap<String, Instant>,
}

impl DedupedAlerts {
    pub fn new(inner: Arc<dyn AlertSink>, window: Duration) -> Self {
        Self {
            inner,
            window,
            last_sent: DashMap::new(),
        }
    }
}

#[async_trait]
impl AlertSink for DedupedAlerts {
    async fn notify(&self, text: &str, dedupe_key: Option<&str>) -> Result<(), BotfleetError> {
        if let Some(key) = dedupe_key {
            let now = Instant::now();
            let mut suppressed = false;
            // Entry-level upsert keeps check-and-record atomic per key.
            self.last_sent
                .entry(key.to_string())
                .and_modify(|last| {
                    if now.duration_since(*last) < self.window {
                        suppressed = true;
                    } else {
                        *last = now;
                    }
                })
                .or_insert(now);
            if suppressed {
                debug!(dedupe_key = key, "alert suppressed within dedupe window");
                return Ok(());
            }

            // Opportunistic cleanup of long-expired keys.
            self.last_sent
                .retain(|_, last| now.duration_since(*last) < self.window * 2);
        }

        self.inner.notify(text, dedupe_key).await
    }
}
