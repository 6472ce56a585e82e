// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-budgeted conversation transcript assembly.
//!
//! Builds the model-ready slice of prior conversation for a generation
//! call: newest messages are kept first until the token budget would
//! overflow, then the kept slice is re-ordered to chronological for the
//! provider.

pub mod builder;
pub mod tokens;

pub use builder::ContextBuilder;
