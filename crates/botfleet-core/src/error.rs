// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types and the failure classifier for the Botfleet pipeline.
//!
//! Every failure that escapes a job handler is classified into one of three
//! kinds before the worker decides whether to requeue, give up, or alert:
//! credential problems an operator must fix, transient faults the queue
//! should retry, and structural failures no retry can heal.

use thiserror::Error;

/// The primary error type used across all Botfleet crates.
#[derive(Debug, Error)]
pub enum BotfleetError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging channel errors (send/edit failure, rate limiting, revoked token).
    ///
    /// `status` carries the HTTP status reported by the channel API, when the
    /// adapter could extract one.
    #[error("channel error: {message}")]
    Channel {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generation provider errors (API failure, token limits, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Deliberate refusal raised by domain logic: the input can never be
    /// processed successfully and must not be retried (malformed payload,
    /// missing required entity, broken linkage).
    #[error("terminal: {reason}")]
    Terminal { reason: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BotfleetError {
    /// Shorthand constructor for a [`BotfleetError::Terminal`] refusal.
    pub fn terminal(reason: impl Into<String>) -> Self {
        BotfleetError::Terminal {
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status attached to channel/provider errors, if any.
    ///
    /// Wire adapters populate this from the provider's `statusCode` field
    /// first, falling back to `status`, so the classifier only ever needs to
    /// look in one place.
    pub fn status(&self) -> Option<u16> {
        match self {
            BotfleetError::Channel { status, .. } | BotfleetError::Provider { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}

/// How a failure should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credential or permission failure. Retrying will not help, but the
    /// account is operator-fixable, so it is reported distinctly.
    Fatal,
    /// Rate limiting or transient network failure. The queue retries with
    /// backoff.
    Retryable,
    /// Structurally invalid input or a deliberate domain refusal. Retrying
    /// can never succeed.
    Terminal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Fatal => write!(f, "fatal"),
            FailureKind::Retryable => write!(f, "retryable"),
            FailureKind::Terminal => write!(f, "terminal"),
        }
    }
}

const FATAL_MARKERS: [&str; 3] = ["unauthorized", "forbidden", "invalid token"];
const RETRYABLE_MARKERS: [&str; 4] = ["rate limit", "timed out", "timeout", "connection reset"];

/// Classifies an error into a [`FailureKind`].
///
/// Pure function, no side effects. A [`BotfleetError::Terminal`] always
/// classifies as terminal regardless of any status or message heuristics.
pub fn classify(error: &BotfleetError) -> FailureKind {
    if let BotfleetError::Terminal { .. } = error {
        return FailureKind::Terminal;
    }
    if let BotfleetError::Timeout { .. } = error {
        return FailureKind::Retryable;
    }

    if let Some(status) = error.status() {
        match status {
            401 | 403 => return FailureKind::Fatal,
            429 | 500..=599 => return FailureKind::Retryable,
            _ => {}
        }
    }

    let text = error.to_string().to_lowercase();
    if FATAL_MARKERS.iter().any(|m| text.contains(m)) {
        FailureKind::Fatal
    } else if RETRYABLE_MARKERS.iter().any(|m| text.contains(m)) {
        FailureKind::Retryable
    } else {
        FailureKind::Terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_error(message: &str, status: Option<u16>) -> BotfleetError {
        BotfleetError::Channel {
            message: message.into(),
            status,
            source: None,
        }
    }

    #[test]
    fn status_401_is_fatal() {
        assert_eq!(
            classify(&channel_error("request rejected", Some(401))),
            FailureKind::Fatal
        );
        assert_eq!(
            classify(&channel_error("request rejected", Some(403))),
            FailureKind::Fatal
        );
    }

    #[test]
    fn status_5xx_and_429_are_retryable() {
        assert_eq!(
            classify(&channel_error("bad gateway", Some(502))),
            FailureKind::Retryable
        );
        assert_eq!(
            classify(&channel_error("service unavailable", Some(503))),
            FailureKind::Retryable
        );
        assert_eq!(
            classify(&channel_error("too many requests", Some(429))),
            FailureKind::Retryable
        );
    }

    #[test]
    fn rate_limit_text_is_retryable() {
        let err = BotfleetError::Provider {
            message: "rate limit exceeded".into(),
            status: None,
            source: None,
        };
        assert_eq!(classify(&err), FailureKind::Retryable);
    }

    #[test]
    fn credential_text_is_fatal() {
        assert_eq!(
            classify(&channel_error("Unauthorized", None)),
            FailureKind::Fatal
        );
        assert_eq!(
            classify(&channel_error("bot was given an invalid token", None)),
            FailureKind::Fatal
        );
    }

    #[test]
    fn connection_reset_is_retryable() {
        assert_eq!(
            classify(&channel_error("connection reset by peer", None)),
            FailureKind::Retryable
        );
    }

    #[test]
    fn timeout_variant_is_retryable() {
        let err = BotfleetError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        assert_eq!(classify(&err), FailureKind::Retryable);
    }

    #[test]
    fn unrecognized_error_is_terminal() {
        assert_eq!(
            classify(&BotfleetError::Internal("something odd happened".into())),
            FailureKind::Terminal
        );
    }

    #[test]
    fn terminal_variant_wins_over_heuristics() {
        // Even a message that looks transient stays terminal when raised
        // through the dedicated refusal variant.
        let err = BotfleetError::terminal("rate limit text inside a refusal");
        assert_eq!(classify(&err), FailureKind::Terminal);
    }

    #[test]
    fn status_accessor_reads_channel_and_provider() {
        assert_eq!(channel_error("x", Some(418)).status(), Some(418));
        let provider = BotfleetError::Provider {
            message: "x".into(),
            status: Some(500),
            source: None,
        };
        assert_eq!(provider.status(), Some(500));
        assert_eq!(BotfleetError::Config("x".into()).status(), None);
    }
}
