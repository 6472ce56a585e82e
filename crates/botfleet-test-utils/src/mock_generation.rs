// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation client producing scripted streams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use botfleet_core::types::{AnswerEvent, AnswerRequest, AnswerResponse};
use botfleet_core::{AnswerStream, BotfleetError, GenerationClient};
use futures::StreamExt;

/// A mock generation provider.
///
/// Emits the configured chunks as `Delta` events followed by one
/// `Completed` event, optionally pausing between chunks. Can be configured
/// to fail instead, and counts how often it was called so tests can assert
/// "no provider call was made".
pub struct MockGenerationClient {
    chunks: Vec<String>,
    completion: Option<(f64, Option<String>, serde_json::Value)>,
    chunk_delay: Option<Duration>,
    failure: Option<(String, Option<u16>)>,
    calls: AtomicUsize,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            completion: None,
            chunk_delay: None,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the text deltas of the stream.
    pub fn with_chunks(mut self, chunks: Vec<&str>) -> Self {
        self.chunks = chunks.into_iter().map(|s| s.to_string()).collect();
        self
    }

    /// Script the completion event (price, continuation id, raw payload).
    pub fn with_completion(
        mut self,
        price: f64,
        continuation_id: Option<&str>,
        raw_response: serde_json::Value,
    ) -> Self {
        self.completion = Some((
            price,
            continuation_id.map(|s| s.to_string()),
            raw_response,
        ));
        self
    }

    /// Pause between chunks, for tests exercising timing behavior.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Fail every call with a provider error.
    pub fn failing_with(mut self, message: &str, status: Option<u16>) -> Self {
        self.failure = Some((message.to_string(), status));
        self
    }

    /// How many generation calls (streaming or not) were made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn failure_error(&self) -> Option<BotfleetError> {
        self.failure
            .as_ref()
            .map(|(message, status)| BotfleetError::Provider {
                message: message.clone(),
                status: *status,
                source: None,
            })
    }

    fn events(&self) -> Vec<Result<AnswerEvent, BotfleetError>> {
        let mut events: Vec<Result<AnswerEvent, BotfleetError>> = self
            .chunks
            .iter()
            .map(|text| Ok(AnswerEvent::Delta { text: text.clone() }))
            .collect();
        if let Some((price, continuation_id, raw_response)) = &self.completion {
            events.push(Ok(AnswerEvent::Completed {
                price: *price,
                continuation_id: continuation_id.clone(),
                raw_response: raw_response.clone(),
            }));
        }
        events
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn stream_answer(&self, _request: AnswerRequest) -> Result<AnswerStream, BotfleetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure_error() {
            return Err(err);
        }

        let delay = self.chunk_delay;
        let stream = futures::stream::iter(self.events()).then(move |event| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            event
        });
        Ok(Box::pin(stream))
    }

    async fn get_answer(&self, request: AnswerRequest) -> Result<AnswerResponse, BotfleetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure_error() {
            return Err(err);
        }

        let (price, continuation_id, raw_response) = self
            .completion
            .clone()
            .unwrap_or((0.0, None, serde_json::Value::Null));
        let _ = request;
        Ok(AnswerResponse {
            text: self.chunks.concat(),
            price,
            continuation_id,
            raw_response,
        })
    }
}
