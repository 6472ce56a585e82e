// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typing indicator -- a cancellable background refresh loop.
//!
//! The channel's typing status expires after a few seconds, so the loop
//! refreshes it periodically. Dropping the handle cancels the loop, which
//! guarantees the indicator never outlives the generation call on any exit
//! path.

use std::sync::Arc;
use std::time::Duration;

use botfleet_core::ChannelClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Refresh faster than the channel-side expiry.
const REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Handle to a running typing indicator loop.
pub struct TypingIndicator {
    cancel: CancellationToken,
}

impl TypingIndicator {
    /// Spawns the refresh loop for `chat_id`. The first indicator is sent
    /// immediately.
    pub fn start(channel: Arc<dyn ChannelClient>, chat_id: i64) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }
                if let Err(e) = channel.send_typing_indicator(chat_id).await {
                    // Typing is cosmetic; keep refreshing on failure.
                    warn!(chat_id, error = %e, "failed to send typing indicator");
                }
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(chat_id, "typing indicator stopped");
                        break;
                    }
                    _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
                }
            }
        });
        Self { cancel }
    }

    /// Stops the loop. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the loop when cancelled; lets the streaming state
    /// stop typing on first delivery without holding the handle.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use botfleet_core::BotfleetError;

    struct CountingChannel {
        typing_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChannelClient for CountingChannel {
        async fn send_message(&self, _: i64, _: &str) -> Result<i64, BotfleetError> {
            Ok(1)
        }
        async fn edit_message_text(&self, _: i64, _: i64, _: &str) -> Result<(), BotfleetError> {
            Ok(())
        }
        async fn send_typing_indicator(&self, _: i64) -> Result<(), BotfleetError> {
            self.typing_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn answer_callback(&self, _: &str, _: Option<&str>) -> Result<(), BotfleetError> {
            Ok(())
        }
        async fn set_webhook(&self, _: &str) -> Result<(), BotfleetError> {
            Ok(())
        }
        async fn delete_webhook(&self, _: &str) -> Result<(), BotfleetError> {
            Ok(())
        }
        async fn start_polling(&self, _: &str) -> Result<(), BotfleetError> {
            Ok(())
        }
        async fn stop_polling(&self, _: &str) -> Result<(), BotfleetError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn sends_immediately_and_stops_on_cancel() {
        let channel = Arc::new(CountingChannel {
            typing_calls: AtomicUsize::new(0),
        });
        let indicator = TypingIndicator::start(channel.clone(), 42);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.typing_calls.load(Ordering::SeqCst), 1);

        indicator.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_stop = channel.typing_calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.typing_calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn drop_cancels_the_loop() {
        let channel = Arc::new(CountingChannel {
            typing_calls: AtomicUsize::new(0),
        });
        {
            let _indicator = TypingIndicator::start(channel.clone(), 42);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let after_drop = channel.typing_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.typing_calls.load(Ordering::SeqCst), after_drop);
    }
}
