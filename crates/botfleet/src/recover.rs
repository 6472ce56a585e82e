// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `botfleet recover` command implementation.
//!
//! Re-enqueues every failed message as a minimal trigger job. The trigger
//! carries only the message id, so the worker reloads everything fresh
//! from the store; the singleton key keeps repeated recover runs from
//! stacking duplicate jobs.

use botfleet_config::BotfleetConfig;
use botfleet_core::types::{JobPayload, PublishOptions, PROCESS_UPDATE_JOB};
use botfleet_core::BotfleetError;
use botfleet_storage::queries::{jobs, processing_states};
use botfleet_storage::Database;
use tracing::info;

/// Publishes a retry trigger for each failed message.
pub async fn run_recover(config: &BotfleetConfig) -> Result<(), BotfleetError> {
    let db = Database::open(&config.storage.database_path).await?;

    let failed = processing_states::find_failed(&db).await?;
    for state in &failed {
        let payload = JobPayload::Trigger {
            user_message_id: state.user_message_id.clone(),
        };
        let options = PublishOptions {
            retry_limit: config.worker.retry_limit,
            retry_backoff: config.worker.retry_backoff,
            singleton_key: Some(format!("msg:{}", state.user_message_id)),
            ..PublishOptions::default()
        };
        let job_id = jobs::publish(&db, PROCESS_UPDATE_JOB, &payload, &options).await?;
        info!(
            user_message_id = %state.user_message_id,
            job_id,
            "recovery trigger published"
        );
    }

    println!("re-enqueued {} failed message(s)", failed.len());
    db.close().await
}
