// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Botfleet operator CLI.
//!
//! The worker pool itself is embedded by the host service through
//! `botfleet-worker`; this binary covers the operator side: applying
//! migrations, inspecting pipeline state, and re-enqueuing failed
//! messages.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod recover;
mod status;

/// Botfleet - message-processing pipeline for a fleet of chat bots.
#[derive(Parser, Debug)]
#[command(name = "botfleet", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the database and apply pending migrations.
    Migrate,
    /// Show processing-state and job-queue counts.
    Status,
    /// Re-enqueue all failed messages for another processing attempt.
    Recover,
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match botfleet_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            botfleet_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.worker.log_level);

    let result = match cli.command {
        Some(Commands::Migrate) => status::run_migrate(&config).await,
        Some(Commands::Status) => status::run_status(&config).await,
        Some(Commands::Recover) => recover::run_recover(&config).await,
        None => {
            println!("botfleet: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
