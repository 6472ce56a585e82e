// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client trait for the AI generation provider.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::BotfleetError;
use crate::types::{AnswerEvent, AnswerRequest, AnswerResponse};

/// Boxed stream of generation events.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerEvent, BotfleetError>> + Send>>;

/// Client for the external generation provider.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Starts a streaming generation call.
    ///
    /// The stream yields `Delta` events as text arrives and exactly one
    /// `Completed` event (pricing, continuation id, raw payload) at the end
    /// of a successful stream.
    async fn stream_answer(&self, request: AnswerRequest) -> Result<AnswerStream, BotfleetError>;

    /// Runs a generation call to completion without streaming. Used by
    /// paths that have no incremental delivery to do.
    async fn get_answer(&self, request: AnswerRequest) -> Result<AnswerResponse, BotfleetError>;
}
