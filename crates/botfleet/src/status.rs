// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `botfleet migrate` and `botfleet status` command implementations.

use botfleet_config::BotfleetConfig;
use botfleet_core::BotfleetError;
use botfleet_storage::queries::{jobs, processing_states};
use botfleet_storage::Database;
use tracing::info;

/// Opens the database, which applies any pending migrations.
pub async fn run_migrate(config: &BotfleetConfig) -> Result<(), BotfleetError> {
    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "migrations applied");
    println!("database ready at {}", config.storage.database_path);
    db.close().await
}

/// Prints processing-state and job-queue counts.
pub async fn run_status(config: &BotfleetConfig) -> Result<(), BotfleetError> {
    let db = Database::open(&config.storage.database_path).await?;

    println!("processing states:");
    let state_counts = processing_states::counts_by_status(&db).await?;
    if state_counts.is_empty() {
        println!("  (none)");
    }
    for (status, count) in state_counts {
        println!("  {status:<12} {count}");
    }

    println!("jobs:");
    let job_counts = jobs::counts_by_status(&db).await?;
    if job_counts.is_empty() {
        println!("  (none)");
    }
    for (status, count) in job_counts {
        println!("  {status:<12} {count}");
    }

    db.close().await
}
