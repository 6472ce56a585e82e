// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Produces the reply for one inbound message.
//!
//! Slash commands are answered from the bot's configured texts without a
//! provider call. Everything else drives a streaming generation call:
//! partial text is persisted and delivered edit-in-place, throttled to one
//! channel edit per debounce interval, with a typing indicator until the
//! first partial message lands. Stream completion forces a final write and
//! records pricing, the raw provider payload, and the thread's continuation
//! token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use botfleet_core::types::{AnswerEvent, AnswerRequest, Bot, ChatMessage, Thread};
use botfleet_core::{BotfleetError, ChannelClient, GenerationClient};
use botfleet_context::ContextBuilder;
use botfleet_storage::queries::{messages, processing_states, threads};
use botfleet_storage::Database;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::truncate::truncate_for_channel;
use crate::typing::TypingIndicator;

/// Interval between partial-update deliveries.
const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum trimmed length before the first outgoing message is created.
/// Avoids sending near-empty messages while the first tokens trickle in.
const MIN_FIRST_SEND_CHARS: usize = 20;

/// Generates and incrementally delivers replies.
pub struct ResponseGenerator {
    db: Database,
    channel: Arc<dyn ChannelClient>,
    generation: Arc<dyn GenerationClient>,
    context: ContextBuilder,
    debounce: Duration,
    min_first_send: usize,
}

impl ResponseGenerator {
    pub fn new(
        db: Database,
        channel: Arc<dyn ChannelClient>,
        generation: Arc<dyn GenerationClient>,
        context: ContextBuilder,
    ) -> Self {
        Self {
            db,
            channel,
            generation,
            context,
            debounce: DEBOUNCE_INTERVAL,
            min_first_send: MIN_FIRST_SEND_CHARS,
        }
    }

    /// Overrides the partial-update interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Overrides the first-send length gate.
    pub fn with_min_first_send(mut self, chars: usize) -> Self {
        self.min_first_send = chars;
        self
    }

    /// Produces the reply for `incoming`, persisting generation metadata on
    /// the message's processing state as a side effect.
    pub async fn generate(
        &self,
        bot: &Bot,
        thread: &Thread,
        incoming: &ChatMessage,
    ) -> Result<(), BotfleetError> {
        if let Some(text) = command_reply(bot, incoming.text.trim()) {
            return self.reply_with_fixed_text(bot, thread, incoming, &text).await;
        }

        let typing = TypingIndicator::start(self.channel.clone(), thread.chat_id);
        match self.run_stream(&typing, bot, thread, incoming).await {
            Ok(()) => {
                typing.stop();
                Ok(())
            }
            Err(e) => {
                typing.stop();
                error!(
                    user_message_id = %incoming.id,
                    bot_id = %bot.id,
                    thread_id = %thread.id,
                    error = %e,
                    "response generation failed"
                );
                Err(e)
            }
        }
    }

    /// Command path: persist and deliver a fixed reply, no provider call.
    async fn reply_with_fixed_text(
        &self,
        bot: &Bot,
        thread: &Thread,
        incoming: &ChatMessage,
        text: &str,
    ) -> Result<(), BotfleetError> {
        let text = truncate_for_channel(text);
        let reply = messages::new_bot_message(&thread.id, &bot.id, &text);
        messages::insert(&self.db, &reply).await?;
        processing_states::mark_response_generated(&self.db, &incoming.id, &reply.id, None, None)
            .await?;

        let channel_message_id = self.channel.send_message(thread.chat_id, &text).await?;
        messages::set_channel_message_id(&self.db, &reply.id, channel_message_id).await?;
        processing_states::mark_response_sent(&self.db, &incoming.id, Some(channel_message_id))
            .await?;

        info!(
            user_message_id = %incoming.id,
            reply_id = %reply.id,
            "command reply delivered"
        );
        Ok(())
    }

    async fn run_stream(
        &self,
        typing: &TypingIndicator,
        bot: &Bot,
        thread: &Thread,
        incoming: &ChatMessage,
    ) -> Result<(), BotfleetError> {
        let context = self
            .context
            .build(&thread.id, &bot.model, Some(&incoming.id))
            .await?;

        let request = AnswerRequest {
            prompt: bot.prompt.clone(),
            message_text: incoming.text.clone(),
            context,
            model: bot.model.clone(),
            user: incoming.user_id.clone(),
            continuation_token: thread.continuation_token.clone(),
        };

        let mut stream = self.generation.stream_answer(request).await?;

        let mut reply = StreamingReply::new(
            self.db.clone(),
            self.channel.clone(),
            typing.stop_token(),
            thread.id.clone(),
            bot.id.clone(),
            thread.chat_id,
            self.debounce,
            self.min_first_send,
        );
        let mut completion: Option<Completion> = None;

        while let Some(event) = stream.next().await {
            match event? {
                AnswerEvent::Delta { text } => reply.push_chunk(&text).await?,
                AnswerEvent::Completed {
                    price,
                    continuation_id,
                    raw_response,
                } => {
                    completion = Some(Completion {
                        price,
                        continuation_id,
                        raw_response,
                    });
                }
            }
        }

        let (reply_message_id, channel_message_id) = reply.finalize().await?;

        let (price, continuation_id, raw_json) = match completion {
            Some(c) => (
                Some(c.price),
                c.continuation_id,
                serde_json::to_string(&c.raw_response).ok(),
            ),
            None => (None, None, None),
        };

        processing_states::mark_response_generated(
            &self.db,
            &incoming.id,
            &reply_message_id,
            price,
            raw_json.as_deref(),
        )
        .await?;
        processing_states::mark_response_sent(&self.db, &incoming.id, channel_message_id).await?;

        if let Some(token) = &continuation_id {
            threads::update_continuation_token(&self.db, &thread.id, Some(token)).await?;
        }

        info!(
            user_message_id = %incoming.id,
            reply_id = %reply_message_id,
            price = price.unwrap_or(0.0),
            "streamed reply delivered"
        );
        Ok(())
    }
}

struct Completion {
    price: f64,
    continuation_id: Option<String>,
    raw_response: serde_json::Value,
}

/// Returns the fixed reply for a slash command, if `text` is one.
fn command_reply(bot: &Bot, text: &str) -> Option<String> {
    match text {
        "/start" => Some(bot.start_text.clone().unwrap_or_else(|| {
            "Hi! Send me a message and I will answer.".to_string()
        })),
        "/help" => Some(bot.help_text.clone().unwrap_or_else(|| {
            "Send me a message and I will answer.".to_string()
        })),
        _ => None,
    }
}

/// Mutable per-stream state: accumulated text, the lazily-created reply
/// row, its delivered channel id, and the debounce clock.
///
/// All updates run inside the single stream-consumer loop and each write is
/// awaited before the next begins, so channel edits for one message are
/// never in flight concurrently or applied out of order.
struct StreamingReply {
    db: Database,
    channel: Arc<dyn ChannelClient>,
    stop_typing: CancellationToken,
    thread_id: String,
    bot_id: String,
    chat_id: i64,
    buffer: String,
    message_id: Option<String>,
    channel_message_id: Option<i64>,
    last_written: String,
    last_write: Instant,
    debounce: Duration,
    min_first_send: usize,
}

impl StreamingReply {
    #[allow(clippy::too_many_arguments)]
    fn new(
        db: Database,
        channel: Arc<dyn ChannelClient>,
        stop_typing: CancellationToken,
        thread_id: String,
        bot_id: String,
        chat_id: i64,
        debounce: Duration,
        min_first_send: usize,
    ) -> Self {
        Self {
            db,
            channel,
            stop_typing,
            thread_id,
            bot_id,
            chat_id,
            buffer: String::new(),
            message_id: None,
            channel_message_id: None,
            last_written: String::new(),
            last_write: Instant::now(),
            debounce,
            min_first_send,
        }
    }

    /// Accumulates a chunk and delivers a partial update when due.
    ///
    /// The first message is created only once enough text has accumulated;
    /// after that, edits are throttled to one per debounce interval. A
    /// chunk arriving inside the interval just extends the buffer -- the
    /// next due write carries everything accumulated so far.
    async fn push_chunk(&mut self, chunk: &str) -> Result<(), BotfleetError> {
        self.buffer.push_str(chunk);

        if self.message_id.is_none() {
            if self.buffer.trim().chars().count() >= self.min_first_send {
                self.create_and_send().await?;
            }
            return Ok(());
        }

        if self.last_write.elapsed() >= self.debounce {
            self.write_update().await?;
        }
        Ok(())
    }

    /// Cancels the debounce clock and forces one final write, then returns
    /// the reply's ids. A final answer shorter than the first-send gate is
    /// still created and sent here.
    async fn finalize(&mut self) -> Result<(String, Option<i64>), BotfleetError> {
        if self.message_id.is_none() {
            if self.buffer.trim().is_empty() {
                return Err(BotfleetError::Provider {
                    message: "generation stream produced no text".to_string(),
                    status: None,
                    source: None,
                });
            }
            self.create_and_send().await?;
        } else {
            self.write_update().await?;
        }

        // message_id is set by now on every path above.
        let message_id = self
            .message_id
            .clone()
            .ok_or_else(|| BotfleetError::Internal("reply finalized without a message".into()))?;
        Ok((message_id, self.channel_message_id))
    }

    /// Creates the reply row and delivers it for the first time. Stops the
    /// typing indicator -- progress is visible through edits from here on.
    async fn create_and_send(&mut self) -> Result<(), BotfleetError> {
        let text = truncate_for_channel(&self.buffer);
        let reply = messages::new_bot_message(&self.thread_id, &self.bot_id, &text);
        messages::insert(&self.db, &reply).await?;
        self.message_id = Some(reply.id.clone());

        let channel_message_id = self.channel.send_message(self.chat_id, &text).await?;
        messages::set_channel_message_id(&self.db, &reply.id, channel_message_id).await?;
        self.channel_message_id = Some(channel_message_id);

        self.stop_typing.cancel();
        self.last_written = text;
        self.last_write = Instant::now();
        debug!(reply_id = %reply.id, channel_message_id, "first partial message sent");
        Ok(())
    }

    /// Persists and delivers the accumulated text, skipping entirely when
    /// nothing changed since the last successful write.
    async fn write_update(&mut self) -> Result<(), BotfleetError> {
        let text = truncate_for_channel(&self.buffer);
        if text == self.last_written {
            return Ok(());
        }

        let message_id = self
            .message_id
            .clone()
            .ok_or_else(|| BotfleetError::Internal("partial update without a message".into()))?;
        messages::update_text(&self.db, &message_id, &text).await?;
        if let Some(channel_message_id) = self.channel_message_id {
            self.channel
                .edit_message_text(self.chat_id, channel_message_id, &text)
                .await?;
        }

        self.last_written = text;
        self.last_write = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfleet_core::types::ProcessingStatus;
    use botfleet_storage::queries::bots;
    use botfleet_test_utils::{MockChannelClient, MockGenerationClient};
    use tempfile::tempdir;

    struct Fixture {
        db: Database,
        _dir: tempfile::TempDir,
        channel: Arc<MockChannelClient>,
        generation: Arc<MockGenerationClient>,
        bot: Bot,
        thread: Thread,
    }

    async fn fixture(generation: MockGenerationClient) -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let bot = bots::new_bot("b1", "support");
        bots::insert(&db, &bot).await.unwrap();
        let thread = botfleet_storage::queries::threads::new_thread("t1", "b1", 42);
        botfleet_storage::queries::threads::insert(&db, &thread)
            .await
            .unwrap();
        Fixture {
            db,
            _dir: dir,
            channel: Arc::new(MockChannelClient::new()),
            generation: Arc::new(generation),
            bot,
            thread,
        }
    }

    fn incoming(id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            thread_id: Some("t1".to_string()),
            bot_id: None,
            user_id: Some("u1".to_string()),
            from_admin: false,
            text: text.to_string(),
            channel_message_id: Some(11),
            created_at: "2026-01-01T00:00:01.000Z".to_string(),
        }
    }

    fn generator(fx: &Fixture) -> ResponseGenerator {
        ResponseGenerator::new(
            fx.db.clone(),
            fx.channel.clone(),
            fx.generation.clone(),
            ContextBuilder::new(fx.db.clone(), 5000),
        )
        .with_min_first_send(5)
    }

    async fn seed_state(db: &Database, id: &str) {
        processing_states::get_or_create(db, id).await.unwrap();
        processing_states::mark_processing(db, id).await.unwrap();
    }

    #[tokio::test]
    async fn start_command_skips_the_provider() {
        let fx = fixture(MockGenerationClient::new()).await;
        let msg = incoming("m1", "/start");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        assert_eq!(fx.generation.call_count(), 0);
        let sent = fx.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, fx.bot.start_text.clone().unwrap());

        let state = processing_states::get(&fx.db, "m1").await.unwrap().unwrap();
        assert!(state.response_message_id.is_some());
        assert!(state.response_generated_at.is_some());
        assert!(state.response_sent_at.is_some());

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn streaming_creates_once_then_edits_once_at_completion() {
        let generation = MockGenerationClient::new()
            .with_chunks(vec!["Hel", "lo wor", "ld!"])
            .with_completion(0.002, Some("resp_1"), serde_json::json!({"id": "resp_1"}));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "say hello");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        // First send happens once the buffer clears the gate ("Hello wor"),
        // the rest arrives inside the debounce window and lands in the one
        // forced final edit.
        let sent = fx.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Hello wor");

        let edits = fx.channel.edits().await;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].2, "Hello world!");

        // Persisted reply carries the final text and the delivered id.
        let state = processing_states::get(&fx.db, "m1").await.unwrap().unwrap();
        let reply_id = state.response_message_id.clone().unwrap();
        let reply = botfleet_storage::queries::messages::get(&fx.db, &reply_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.text, "Hello world!");
        assert_eq!(state.price, Some(0.002));
        assert!(state.raw_response.unwrap().contains("resp_1"));
        assert!(state.response_sent_at.is_some());
        // Status is the processor's job, not the generator's.
        assert_eq!(state.status, ProcessingStatus::Processing);

        // Continuation token recorded for the next turn.
        let thread = botfleet_storage::queries::threads::get(&fx.db, "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thread.continuation_token.as_deref(), Some("resp_1"));

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn debounce_coalesces_rapid_chunks() {
        let chunks: Vec<String> = (0..30).map(|i| format!("chunk {i} ")).collect();
        let generation = MockGenerationClient::new()
            .with_chunks(chunks.iter().map(|s| s.as_str()).collect::<Vec<_>>())
            .with_completion(0.01, None, serde_json::json!({}));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "go");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        // Far fewer channel calls than chunks, and the final text is the
        // full concatenation.
        let sent = fx.channel.sent_messages().await;
        let edits = fx.channel.edits().await;
        assert_eq!(sent.len(), 1);
        assert!(
            sent.len() + edits.len() < 30,
            "got {} sends and {} edits",
            sent.len(),
            edits.len()
        );
        let full: String = chunks.concat();
        assert_eq!(edits.last().unwrap().2, full);

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn short_final_answer_is_still_sent() {
        let generation = MockGenerationClient::new()
            .with_chunks(vec!["ok!"])
            .with_completion(0.001, None, serde_json::json!({}));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "quick one");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        // "ok!" never clears the 5-char gate during streaming, so creation
        // happens in the forced final write.
        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        let sent = fx.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "ok!");
        assert!(fx.channel.edits().await.is_empty());

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_text_skips_the_final_edit() {
        let generation = MockGenerationClient::new()
            .with_chunks(vec!["a complete answer in one chunk"])
            .with_completion(0.001, None, serde_json::json!({}));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "one shot");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        assert_eq!(fx.channel.sent_messages().await.len(), 1);
        // Everything was already written at creation time; the forced final
        // update detects no change and stays silent.
        assert!(fx.channel.edits().await.is_empty());

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn typing_stops_after_first_delivery() {
        let generation = MockGenerationClient::new()
            .with_chunks(vec!["a long enough first chunk to send"])
            .with_completion(0.001, None, serde_json::json!({}))
            .with_chunk_delay(Duration::from_millis(30));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "hello");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        // The indicator ran before the first delivery and not after.
        let typing_during = fx.channel.typing_count().await;
        assert!(typing_during >= 1);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fx.channel.typing_count().await, typing_during);

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stream_error_is_rethrown_unchanged() {
        let generation =
            MockGenerationClient::new().failing_with("rate limit exceeded", Some(429));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "hello");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        let err = generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert!(fx.channel.sent_messages().await.is_empty());

        fx.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn long_partials_are_truncated() {
        let big = "y".repeat(6000);
        let generation = MockGenerationClient::new()
            .with_chunks(vec![big.as_str()])
            .with_completion(0.02, None, serde_json::json!({}));
        let fx = fixture(generation).await;
        let msg = incoming("m1", "write a lot");
        botfleet_storage::queries::messages::insert(&fx.db, &msg)
            .await
            .unwrap();
        seed_state(&fx.db, "m1").await;

        generator(&fx)
            .generate(&fx.bot, &fx.thread, &msg)
            .await
            .unwrap();

        let sent = fx.channel.sent_messages().await;
        assert_eq!(
            sent[0].1.chars().count(),
            crate::truncate::MAX_MESSAGE_LEN
        );

        fx.db.close().await.unwrap();
    }
}
