// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client trait for the messaging channel (send, edit, typing, webhooks).

use async_trait::async_trait;

use crate::error::BotfleetError;

/// Client for the external messaging platform.
///
/// Message ids returned by `send_message` are the channel's own identifiers
/// and are persisted for idempotent re-delivery checks.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Sends a message to a chat, returning the channel-assigned message id.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotfleetError>;

    /// Rewrites the text of an already-delivered message.
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), BotfleetError>;

    /// Shows the "typing…" indicator in a chat. The indicator expires on the
    /// channel side after a few seconds, so callers refresh it periodically.
    async fn send_typing_indicator(&self, chat_id: i64) -> Result<(), BotfleetError>;

    /// Acknowledges a callback query, optionally with a short notice.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), BotfleetError>;

    /// Registers the update webhook for a bot.
    async fn set_webhook(&self, bot_id: &str) -> Result<(), BotfleetError>;

    /// Removes the update webhook for a bot.
    async fn delete_webhook(&self, bot_id: &str) -> Result<(), BotfleetError>;

    /// Starts the long-polling consumer for a bot.
    async fn start_polling(&self, bot_id: &str) -> Result<(), BotfleetError>;

    /// Stops the long-polling consumer for a bot.
    async fn stop_polling(&self, bot_id: &str) -> Result<(), BotfleetError>;
}
