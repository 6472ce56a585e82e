// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-message state machine.
//!
//! One invocation drives a message from wherever it stopped to completion:
//!
//! ```text
//! received --(mark_processing)--> processing
//! processing --(generate + deliver ok)--> completed      [absorbing]
//! processing --(retryable failure)--> failed --(requeue)--> processing
//! processing --(fatal/terminal failure)--> terminal      [absorbing]
//! ```
//!
//! The processor only raises; whether a failure retries, alerts, or parks
//! the job is the worker layer's decision.

use botfleet_core::types::{Bot, ChatMessage, ProcessingStatus, Thread};
use botfleet_core::BotfleetError;
use botfleet_storage::queries::{bots, messages, processing_states, threads};
use botfleet_storage::Database;
use tracing::{debug, info};

use crate::generator::ResponseGenerator;
use crate::sender::ResponseSender;

/// Orchestrates generation and delivery for one inbound message.
pub struct MessageProcessor {
    db: Database,
    generator: ResponseGenerator,
    sender: ResponseSender,
}

impl MessageProcessor {
    pub fn new(db: Database, generator: ResponseGenerator, sender: ResponseSender) -> Self {
        Self {
            db,
            generator,
            sender,
        }
    }

    /// Processes `user_message_id` to completion.
    ///
    /// Safe to call again for an already-completed message (no-op) and
    /// after a crash at any point -- the reply is resumed, never
    /// regenerated, once one has been persisted.
    pub async fn process(&self, user_message_id: &str) -> Result<(), BotfleetError> {
        let (incoming, thread, bot) = self.load_entities(user_message_id).await?;

        let state = processing_states::get_or_create(&self.db, user_message_id).await?;
        if state.status == ProcessingStatus::Completed {
            info!(user_message_id, "already completed, nothing to do");
            return Ok(());
        }

        processing_states::mark_processing(&self.db, user_message_id).await?;

        match &state.response_message_id {
            None => {
                debug!(user_message_id, "no reply yet, generating");
                self.generator.generate(&bot, &thread, &incoming).await?;
            }
            Some(reply_id) if state.response_sent_at.is_none() => {
                // Crash window between generation and delivery: deliver the
                // persisted reply as-is instead of generating a duplicate.
                debug!(user_message_id, reply_id = %reply_id, "reply exists, resuming delivery");
                let reply = messages::get(&self.db, reply_id).await?.ok_or_else(|| {
                    BotfleetError::terminal(format!("persisted reply {reply_id} not found"))
                })?;
                let channel_message_id = self.sender.send_existing(&thread, &reply).await?;
                processing_states::mark_response_sent(
                    &self.db,
                    user_message_id,
                    Some(channel_message_id),
                )
                .await?;
            }
            Some(_) => {
                debug!(user_message_id, "reply already generated and sent");
            }
        }

        processing_states::mark_completed(&self.db, user_message_id).await?;
        info!(user_message_id, "processing completed");
        Ok(())
    }

    /// Loads the message, its thread, and the owning bot. Missing linkage
    /// can never heal by retrying, so each miss raises a terminal error.
    async fn load_entities(
        &self,
        user_message_id: &str,
    ) -> Result<(ChatMessage, Thread, Bot), BotfleetError> {
        let incoming = messages::get(&self.db, user_message_id)
            .await?
            .ok_or_else(|| {
                BotfleetError::terminal(format!("inbound message {user_message_id} not found"))
            })?;

        let thread_id = incoming.thread_id.clone().ok_or_else(|| {
            BotfleetError::terminal(format!("message {user_message_id} has no thread"))
        })?;
        let thread = threads::get(&self.db, &thread_id).await?.ok_or_else(|| {
            BotfleetError::terminal(format!("thread {thread_id} not found"))
        })?;

        // Prefer the message's own bot reference, then the thread's.
        let bot_id = incoming
            .bot_id
            .clone()
            .unwrap_or_else(|| thread.bot_id.clone());
        let bot = bots::get(&self.db, &bot_id)
            .await?
            .ok_or_else(|| BotfleetError::terminal(format!("bot {bot_id} not found")))?;

        Ok((incoming, thread, bot))
    }
}
