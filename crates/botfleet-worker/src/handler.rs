// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message-processing job handler and its retry policy.
//!
//! This is the single place that decides whether a failure is swallowed or
//! re-raised: terminal failures park the processing state and complete the
//! job, fatal failures park the state and re-raise so the queue records a
//! failed job, and retryable failures re-raise so the queue's backoff
//! policy requeues. Lower layers only raise.

use std::sync::Arc;

use async_trait::async_trait;
use botfleet_core::types::{Job, JobPayload};
use botfleet_core::{classify, AlertSink, BotfleetError, FailureKind};
use botfleet_pipeline::MessageProcessor;
use botfleet_storage::queries::{bots, processing_states};
use botfleet_storage::Database;
use tracing::{info, warn};

use crate::pool::JobHandler;

/// Handles `process-update` jobs.
pub struct UpdateJobHandler {
    db: Database,
    processor: Arc<MessageProcessor>,
    alerts: Arc<dyn AlertSink>,
}

impl UpdateJobHandler {
    pub fn new(
        db: Database,
        processor: Arc<MessageProcessor>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            db,
            processor,
            alerts,
        }
    }

    async fn on_failure(
        &self,
        job: &Job,
        payload: &JobPayload,
        user_message_id: &str,
        error: BotfleetError,
    ) -> Result<(), BotfleetError> {
        let kind = classify(&error);
        let dedupe_key = dedupe_key(kind, payload);

        match kind {
            FailureKind::Terminal => {
                processing_states::mark_terminal(&self.db, user_message_id, &error.to_string())
                    .await?;
                if let JobPayload::ChannelUpdate { bot_id, .. } = payload {
                    bots::set_last_error(&self.db, bot_id, &error.to_string()).await?;
                }
                self.alert(
                    &format!("giving up on message {user_message_id}: {error}"),
                    &dedupe_key,
                )
                .await;
                warn!(
                    job_id = job.id,
                    user_message_id,
                    error = %error,
                    "terminal failure, job will not be retried"
                );
                Ok(())
            }
            FailureKind::Fatal => {
                processing_states::mark_terminal(&self.db, user_message_id, &error.to_string())
                    .await?;
                self.alert(
                    &format!("credential failure while processing {user_message_id}: {error}"),
                    &dedupe_key,
                )
                .await;
                Err(error)
            }
            FailureKind::Retryable => {
                processing_states::mark_failed(&self.db, user_message_id, &error.to_string())
                    .await?;
                if job.on_last_attempt() {
                    self.alert(
                        &format!("retries exhausted for message {user_message_id}: {error}"),
                        &dedupe_key,
                    )
                    .await;
                }
                Err(error)
            }
        }
    }

    /// Alerts are best-effort; a failed delivery never masks the job error.
    async fn alert(&self, text: &str, dedupe_key: &str) {
        if let Err(e) = self.alerts.notify(text, Some(dedupe_key)).await {
            warn!(error = %e, "alert delivery failed");
        }
    }
}

#[async_trait]
impl JobHandler for UpdateJobHandler {
    async fn handle(&self, job: &Job) -> Result<(), BotfleetError> {
        let payload: JobPayload = match serde_json::from_str(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                // Nothing retryable about a payload that does not parse, and
                // there is no message id to park; alert and swallow.
                warn!(job_id = job.id, error = %e, "malformed job payload, giving up");
                self.alert(
                    &format!("job {} carries a malformed payload: {e}", job.id),
                    &format!("terminal:job:{}", job.id),
                )
                .await;
                return Ok(());
            }
        };

        // Fresh channel updates enrich the state with the channel's own
        // identifiers; everything else is reloaded from the store, so a
        // retried job never acts on stale embedded data.
        if let JobPayload::ChannelUpdate {
            user_message_id,
            channel_update_id,
            incoming_channel_message_id,
            ..
        } = &payload
        {
            processing_states::update_channel_ids(
                &self.db,
                user_message_id,
                *incoming_channel_message_id,
                None,
                *channel_update_id,
            )
            .await?;
        }

        let user_message_id = payload.user_message_id().to_string();
        info!(
            job_id = job.id,
            user_message_id = %user_message_id,
            attempt = job.retry_count,
            "job started"
        );

        match self.processor.process(&user_message_id).await {
            Ok(()) => {
                info!(job_id = job.id, user_message_id = %user_message_id, "job finished");
                Ok(())
            }
            Err(error) => self.on_failure(job, &payload, &user_message_id, error).await,
        }
    }
}

/// Deterministic alert dedupe key for a failure: repeated failures of the
/// same cause collapse to one notification per window.
fn dedupe_key(kind: FailureKind, payload: &JobPayload) -> String {
    match payload {
        JobPayload::ChannelUpdate {
            bot_id,
            channel_update_id,
            ..
        } => format!(
            "{kind}:bot:{bot_id}:update:{}",
            channel_update_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string())
        ),
        JobPayload::Trigger { user_message_id } => format!("{kind}:msg:{user_message_id}"),
    }
}
