// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Botfleet workspace.
//!
//! Mock implementations of the external client traits plus a
//! [`TestHarness`] that assembles the full pipeline over a temp SQLite
//! database for fast, deterministic end-to-end tests.

pub mod harness;
pub mod mock_alerts;
pub mod mock_channel;
pub mod mock_generation;
pub mod mock_queue;

pub use harness::TestHarness;
pub use mock_alerts::MockAlertSink;
pub use mock_channel::MockChannelClient;
pub use mock_generation::MockGenerationClient;
pub use mock_queue::MockJobQueue;
