// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message token counting with layered fallbacks.
//!
//! Preferred: the tokenizer registered for the model. Unrecognized model:
//! the generic `o200k_base` encoding. If no tokenizer can be constructed at
//! all, a chars/4 estimate keeps the budget meaningful rather than failing
//! the whole generation.

use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Counts tokens for one model's tokenizer.
pub struct TokenCounter {
    bpe: Option<CoreBPE>,
}

impl TokenCounter {
    /// Builds a counter for `model`, falling back to the generic encoding
    /// when the model is unrecognized.
    pub fn for_model(model: &str) -> Self {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Some(bpe),
            Err(_) => match tiktoken_rs::o200k_base() {
                Ok(bpe) => {
                    debug!(model, "unrecognized model, using generic encoding");
                    Some(bpe)
                }
                Err(_) => {
                    debug!(model, "no tokenizer available, using char estimate");
                    None
                }
            },
        };
        Self { bpe }
    }

    /// Token count of `text` under this counter.
    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => estimate_tokens(text),
        }
    }
}

/// Rough estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
