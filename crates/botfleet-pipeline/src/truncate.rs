// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel message length limit.

use tracing::warn;

/// Maximum length of a single channel message, in characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Truncates `text` to the channel's single-message limit.
///
/// Truncation never fails an operation; it logs and moves on.
pub fn truncate_for_channel(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(MAX_MESSAGE_LEN) {
        None => text.to_string(),
        Some((byte_offset, _)) => {
            warn!(
                original_chars = text.chars().count(),
                limit = MAX_MESSAGE_LEN,
                "outgoing text truncated to channel limit"
            );
            text[..byte_offset].to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_unchanged() {
        assert_eq!(truncate_for_channel("hello"), "hello");
    }

    #[test]
    fn exact_limit_unchanged() {
        let text = "a".repeat(MAX_MESSAGE_LEN);
        assert_eq!(truncate_for_channel(&text), text);
    }

    #[test]
    fn long_text_truncated_to_exactly_limit() {
        let text = "a".repeat(MAX_MESSAGE_LEN + 100);
        let truncated = truncate_for_channel(&text);
        assert_eq!(truncated.chars().count(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // Multi-byte characters: the limit applies to characters.
        let text = "ü".repeat(MAX_MESSAGE_LEN + 5);
        let truncated = truncate_for_channel(&text);
        assert_eq!(truncated.chars().count(), MAX_MESSAGE_LEN);
        assert!(truncated.chars().all(|c| c == 'ü'));
    }
}
