// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client traits for the external collaborators the pipeline consumes.
//!
//! Concrete wire implementations (the messaging platform API, the generation
//! provider API, the operator alert channel) live outside this workspace;
//! the pipeline only ever sees these traits.

pub mod alert;
pub mod channel;
pub mod generation;
pub mod queue;

pub use alert::AlertSink;
pub use channel::ChannelClient;
pub use generation::{AnswerStream, GenerationClient};
pub use queue::JobQueue;
