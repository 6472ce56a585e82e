// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Botfleet message-processing pipeline.
//!
//! Provides the error taxonomy with its failure classifier, the domain
//! types (processing states, messages, bots, effects, jobs), and the client
//! traits for the external collaborators every other crate consumes.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{classify, BotfleetError, FailureKind};
pub use traits::{AlertSink, AnswerStream, ChannelClient, GenerationClient, JobQueue};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = BotfleetError::Config("test".into());
        let _storage = BotfleetError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = BotfleetError::Channel {
            message: "test".into(),
            status: None,
            source: None,
        };
        let _provider = BotfleetError::Provider {
            message: "test".into(),
            status: Some(500),
            source: None,
        };
        let _terminal = BotfleetError::terminal("test");
        let _timeout = BotfleetError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = BotfleetError::Internal("test".into());
    }

    #[test]
    fn client_traits_are_object_safe() {
        fn _assert_channel(_: &dyn ChannelClient) {}
        fn _assert_generation(_: &dyn GenerationClient) {}
        fn _assert_queue(_: &dyn JobQueue) {}
        fn _assert_alerts(_: &dyn AlertSink) {}
    }
}
