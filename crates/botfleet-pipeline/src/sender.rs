// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of already-finalized replies.
//!
//! Used by the recovery path: a reply that was generated and persisted but
//! never delivered (crash between the two steps) is sent from here without
//! touching the generator.

use std::sync::Arc;

use botfleet_core::types::{ChatMessage, Thread};
use botfleet_core::{BotfleetError, ChannelClient};
use botfleet_storage::queries::messages;
use botfleet_storage::Database;
use tracing::{info, warn};

use crate::truncate::truncate_for_channel;

/// Sends and edits finalized replies.
pub struct ResponseSender {
    db: Database,
    channel: Arc<dyn ChannelClient>,
}

impl ResponseSender {
    pub fn new(db: Database, channel: Arc<dyn ChannelClient>) -> Self {
        Self { db, channel }
    }

    /// Delivers a persisted reply to its thread's chat, recording the
    /// channel-assigned message id. Send failures propagate -- the reply is
    /// not yet delivered and the caller's retry policy decides what next.
    pub async fn send_existing(
        &self,
        thread: &Thread,
        reply: &ChatMessage,
    ) -> Result<i64, BotfleetError> {
        let text = truncate_for_channel(&reply.text);
        let channel_message_id = self.channel.send_message(thread.chat_id, &text).await?;
        messages::set_channel_message_id(&self.db, &reply.id, channel_message_id).await?;
        info!(
            message_id = %reply.id,
            channel_message_id,
            "persisted reply delivered"
        );
        Ok(channel_message_id)
    }

    /// Best-effort edit of an already-delivered message. The message is
    /// out there; a failed edit is cosmetic, so it is logged and swallowed.
    pub async fn edit_delivered(&self, chat_id: i64, channel_message_id: i64, text: &str) {
        let text = truncate_for_channel(text);
        if let Err(e) = self
            .channel
            .edit_message_text(chat_id, channel_message_id, &text)
            .await
        {
            warn!(chat_id, channel_message_id, error = %e, "edit of delivered message failed");
        }
    }
}
