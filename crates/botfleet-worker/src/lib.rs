// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The job worker layer.
//!
//! Consumes jobs from the durable queue with a fixed-size pool per job
//! name, applies the retry policy by failure classification, and notifies
//! the operator -- deduplicated -- when something needs a human.

pub mod alerts;
pub mod handler;
pub mod pool;

pub use alerts::DedupedAlerts;
pub use handler::UpdateJobHandler;
pub use pool::{JobHandler, WorkerPool};
