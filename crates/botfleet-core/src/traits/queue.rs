// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publisher trait over the durable job queue.

use async_trait::async_trait;

use crate::error::BotfleetError;
use crate::types::{JobPayload, PublishOptions};

/// Publishes jobs to the durable queue.
///
/// Abstracted as a trait so effects and tests can publish without a concrete
/// storage handle.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job, returning its queue id.
    async fn publish(
        &self,
        name: &str,
        payload: &JobPayload,
        options: PublishOptions,
    ) -> Result<i64, BotfleetError>;
}
