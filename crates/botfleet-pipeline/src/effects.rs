// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executes effect lists against the external clients.
//!
//! Effects run strictly in order: external call ordering stays
//! deterministic and the logs read top to bottom. A failing effect aborts
//! the remainder of the list and propagates. The `match` below is
//! exhaustive -- adding an `Effect` variant without handling it here is a
//! compile error, never a silent no-op.

use std::sync::Arc;

use botfleet_core::types::{Effect, PublishOptions, PROCESS_UPDATE_JOB};
use botfleet_core::{AlertSink, BotfleetError, ChannelClient, JobQueue};
use tracing::debug;

/// Sequential executor for [`Effect`] lists.
pub struct EffectRunner {
    channel: Arc<dyn ChannelClient>,
    queue: Arc<dyn JobQueue>,
    alerts: Arc<dyn AlertSink>,
}

impl EffectRunner {
    pub fn new(
        channel: Arc<dyn ChannelClient>,
        queue: Arc<dyn JobQueue>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            channel,
            queue,
            alerts,
        }
    }

    /// Runs each effect in order, stopping at the first failure.
    pub async fn run(&self, effects: Vec<Effect>) -> Result<(), BotfleetError> {
        for effect in effects {
            debug!(effect = ?effect, "running effect");
            match effect {
                Effect::EnsureWebhook { bot_id } => self.channel.set_webhook(&bot_id).await?,
                Effect::RemoveWebhook { bot_id } => self.channel.delete_webhook(&bot_id).await?,
                Effect::StartPolling { bot_id } => self.channel.start_polling(&bot_id).await?,
                Effect::StopPolling { bot_id } => self.channel.stop_polling(&bot_id).await?,
                Effect::PublishJob { payload } => {
                    self.queue
                        .publish(PROCESS_UPDATE_JOB, &payload, PublishOptions::default())
                        .await?;
                }
                Effect::AdminAlert { text, dedupe_key } => {
                    self.alerts.notify(&text, dedupe_key.as_deref()).await?;
                }
            }
        }
        Ok(())
    }
}
