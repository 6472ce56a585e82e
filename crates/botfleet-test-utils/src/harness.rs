// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end test harness.
//!
//! Assembles the full pipeline -- temp SQLite database, seeded bot and
//! thread, mock channel/generation/alert clients -- and drives the
//! [`MessageProcessor`] exactly the way a job worker would.

use std::sync::Arc;
use std::time::Duration;

use botfleet_context::ContextBuilder;
use botfleet_core::types::{Bot, ChatMessage, ProcessingState, Thread};
use botfleet_core::BotfleetError;
use botfleet_pipeline::{MessageProcessor, ResponseGenerator, ResponseSender};
use botfleet_storage::queries::{bots, messages, processing_states, threads};
use botfleet_storage::Database;

use crate::mock_alerts::MockAlertSink;
use crate::mock_channel::MockChannelClient;
use crate::mock_generation::MockGenerationClient;

/// Builder for a [`TestHarness`].
pub struct TestHarnessBuilder {
    generation: MockGenerationClient,
    min_first_send: usize,
    debounce: Duration,
    context_budget: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            generation: MockGenerationClient::new(),
            min_first_send: 5,
            debounce: Duration::from_secs(1),
            context_budget: 5000,
        }
    }

    /// Script the generation stream's text deltas.
    pub fn with_chunks(mut self, chunks: Vec<&str>) -> Self {
        self.generation = self.generation.with_chunks(chunks);
        self
    }

    /// Script the generation stream's completion event.
    pub fn with_completion(
        mut self,
        price: f64,
        continuation_id: Option<&str>,
        raw_response: serde_json::Value,
    ) -> Self {
        self.generation = self
            .generation
            .with_completion(price, continuation_id, raw_response);
        self
    }

    /// Make every generation call fail.
    pub fn with_failing_generation(mut self, message: &str, status: Option<u16>) -> Self {
        self.generation = self.generation.failing_with(message, status);
        self
    }

    /// Override the generator's first-send length gate.
    pub fn with_min_first_send(mut self, chars: usize) -> Self {
        self.min_first_send = chars;
        self
    }

    /// Override the generator's debounce interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Override the default context token budget.
    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    /// Build the harness: temp database, seeded bot + thread, mocks, and a
    /// fully wired processor.
    pub async fn build(self) -> Result<TestHarness, BotfleetError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| BotfleetError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("harness.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let bot = bots::new_bot("b1", "support");
        bots::insert(&db, &bot).await?;
        let thread = threads::new_thread("t1", "b1", 42);
        threads::insert(&db, &thread).await?;

        let channel = Arc::new(MockChannelClient::new());
        let generation = Arc::new(self.generation);
        let alerts = Arc::new(MockAlertSink::new());

        let generator = ResponseGenerator::new(
            db.clone(),
            channel.clone(),
            generation.clone(),
            ContextBuilder::new(db.clone(), self.context_budget),
        )
        .with_min_first_send(self.min_first_send)
        .with_debounce(self.debounce);
        let sender = ResponseSender::new(db.clone(), channel.clone());
        let processor = Arc::new(MessageProcessor::new(db.clone(), generator, sender));

        Ok(TestHarness {
            db,
            channel,
            generation,
            alerts,
            bot,
            thread,
            processor,
            message_counter: std::sync::atomic::AtomicI64::new(1),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete pipeline environment over a temp database.
pub struct TestHarness {
    pub db: Database,
    pub channel: Arc<MockChannelClient>,
    pub generation: Arc<MockGenerationClient>,
    pub alerts: Arc<MockAlertSink>,
    pub bot: Bot,
    pub thread: Thread,
    pub processor: Arc<MessageProcessor>,
    message_counter: std::sync::atomic::AtomicI64,
    /// Kept alive so the database file outlives the harness.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Persists an inbound user message on the seeded thread and returns
    /// its id.
    pub async fn seed_incoming(&self, text: &str) -> Result<String, BotfleetError> {
        let n = self
            .message_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let msg = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: Some(self.thread.id.clone()),
            bot_id: None,
            user_id: Some("u1".to_string()),
            from_admin: false,
            text: text.to_string(),
            channel_message_id: Some(n),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        messages::insert(&self.db, &msg).await?;
        Ok(msg.id)
    }

    /// Runs the processor for an already-seeded message.
    pub async fn process(&self, user_message_id: &str) -> Result<(), BotfleetError> {
        self.processor.process(user_message_id).await
    }

    /// Seeds an inbound message and processes it, returning the final
    /// processing state.
    pub async fn process_text(&self, text: &str) -> Result<ProcessingState, BotfleetError> {
        let id = self.seed_incoming(text).await?;
        self.process(&id).await?;
        self.state(&id).await
    }

    /// The processing state for a message, which must exist.
    pub async fn state(&self, user_message_id: &str) -> Result<ProcessingState, BotfleetError> {
        processing_states::get(&self.db, user_message_id)
            .await?
            .ok_or_else(|| {
                BotfleetError::Internal(format!("no processing state for {user_message_id}"))
            })
    }
}
