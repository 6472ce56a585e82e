// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles the token-bounded conversation transcript for one thread.

use botfleet_core::types::{ChatMessage, TranscriptMessage, TranscriptRole};
use botfleet_core::BotfleetError;
use botfleet_storage::queries::{messages, settings};
use botfleet_storage::Database;
use tracing::debug;

use crate::tokens::TokenCounter;

/// Builds model-ready transcripts from stored conversation history.
pub struct ContextBuilder {
    db: Database,
    default_budget: usize,
}

impl ContextBuilder {
    /// `default_budget` applies when the `MAX_CONTEXT_TOKENS` setting is
    /// absent or not a number.
    pub fn new(db: Database, default_budget: usize) -> Self {
        Self { db, default_budget }
    }

    /// Assembles the transcript for `thread_id`, excluding
    /// `exclude_message_id` (the just-received message itself) and all
    /// admin-authored messages.
    ///
    /// Newest messages win the budget; output is chronological.
    pub async fn build(
        &self,
        thread_id: &str,
        model: &str,
        exclude_message_id: Option<&str>,
    ) -> Result<Vec<TranscriptMessage>, BotfleetError> {
        let budget = self.token_budget().await?;

        let mut history = messages::list_for_thread(&self.db, thread_id).await?;
        history.retain(|m| !m.from_admin && Some(m.id.as_str()) != exclude_message_id);

        let counter = TokenCounter::for_model(model);
        let kept = select_within_budget(history, budget, |text| counter.count(text));

        let transcript: Vec<TranscriptMessage> = kept
            .iter()
            .filter_map(|m| {
                let role = if m.is_user() {
                    TranscriptRole::User
                } else if m.is_assistant() {
                    TranscriptRole::Assistant
                } else {
                    // Neither a user nor a bot message: skip.
                    return None;
                };
                Some(TranscriptMessage {
                    role,
                    text: m.text.clone(),
                })
            })
            .collect();

        debug!(
            thread_id,
            budget,
            kept = transcript.len(),
            "context assembled"
        );
        Ok(transcript)
    }

    /// The active token budget: `MAX_CONTEXT_TOKENS` setting when it parses
    /// as an integer, otherwise the configured default.
    async fn token_budget(&self) -> Result<usize, BotfleetError> {
        let value = settings::get_setting(&self.db, settings::MAX_CONTEXT_TOKENS).await?;
        Ok(value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(self.default_budget))
    }
}

/// Greedy newest-first selection under a token budget.
///
/// Messages are taken from newest to oldest; selection stops at the first
/// message that would overflow the budget (the already-accepted set is
/// kept). The result is returned oldest-first.
fn select_within_budget(
    mut history: Vec<ChatMessage>,
    budget: usize,
    count: impl Fn(&str) -> usize,
) -> Vec<ChatMessage> {
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut used = 0usize;
    let mut kept = Vec::new();
    for message in history {
        let tokens = count(&message.text);
        if used + tokens > budget {
            break;
        }
        used += tokens;
        kept.push(message);
    }

    kept.reverse();
    kept
}
