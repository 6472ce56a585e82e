// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock job queue publisher capturing published jobs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use botfleet_core::types::{JobPayload, PublishOptions};
use botfleet_core::{BotfleetError, JobQueue};
use tokio::sync::Mutex;

/// Captures published jobs instead of writing them anywhere.
pub struct MockJobQueue {
    next_id: AtomicI64,
    published: Arc<Mutex<Vec<(String, JobPayload, PublishOptions)>>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything published so far, in order.
    pub async fn published(&self) -> Vec<(String, JobPayload, PublishOptions)> {
        self.published.lock().await.clone()
    }
}

impl Default for MockJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn publish(
        &self,
        name: &str,
        payload: &JobPayload,
        options: PublishOptions,
    ) -> Result<i64, BotfleetError> {
        self.published
            .lock()
            .await
            .push((name.to_string(), payload.clone(), options));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_published_jobs() {
        let queue = MockJobQueue::new();
        let id = queue
            .publish(
                "process-update",
                &JobPayload::Trigger {
                    user_message_id: "m1".into(),
                },
                PublishOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(id, 1);

        let published = queue.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "process-update");
        assert_eq!(published[0].1.user_message_id(), "m1");
    }
}
