// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `botfleet-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use botfleet_core::types::{
    Bot, ChatMessage, DeliveryMode, Job, ProcessingState, ProcessingStatus, Thread,
};
