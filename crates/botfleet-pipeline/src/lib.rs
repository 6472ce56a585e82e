// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message-processing pipeline.
//!
//! One inbound message travels: job -> [`processor::MessageProcessor`] ->
//! [`generator::ResponseGenerator`] (slash command or streaming AI call
//! with debounced partial delivery) -> [`sender::ResponseSender`] ->
//! completed. Side effects decided by domain logic are executed by
//! [`effects::EffectRunner`].

pub mod effects;
pub mod generator;
pub mod processor;
pub mod sender;
pub mod truncate;
pub mod typing;

pub use effects::EffectRunner;
pub use generator::ResponseGenerator;
pub use processor::MessageProcessor;
pub use sender::ResponseSender;
