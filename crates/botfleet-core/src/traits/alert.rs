// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink trait for operator alerts.

use async_trait::async_trait;

use crate::error::BotfleetError;

/// Delivers operator-facing alerts.
///
/// Implementations deduplicate: given the same `dedupe_key`, at most one
/// notification is delivered per rolling window, so repeated failures of the
/// same underlying cause do not spam the operator.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, text: &str, dedupe_key: Option<&str>) -> Result<(), BotfleetError>;
}
