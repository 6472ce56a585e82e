// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Botfleet.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Botfleet configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotfleetConfig {
    /// Job worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Generation defaults.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Operator alert settings.
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Job worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent consumers per registered job.
    #[serde(default = "default_team_size")]
    pub team_size: usize,

    /// Queue poll interval when idle, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Retries allowed after the first attempt of a job.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: i64,

    /// Exponential backoff between retries instead of immediate requeue.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            team_size: default_team_size(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_limit: default_retry_limit(),
            retry_backoff: default_retry_backoff(),
            log_level: default_log_level(),
        }
    }
}

fn default_team_size() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_retry_limit() -> i64 {
    3
}

fn default_retry_backoff() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("botfleet").join("botfleet.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("botfleet.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Generation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Model used when a bot does not configure one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default token budget for conversation context. Overridable at
    /// runtime via the `MAX_CONTEXT_TOKENS` setting.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_context_tokens() -> usize {
    5000
}

/// Operator alert configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    /// Rolling deduplication window: at most one alert per dedupe key
    /// within this many seconds.
    #[serde(default = "default_dedupe_window_secs")]
    pub dedupe_window_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            dedupe_window_secs: default_dedupe_window_secs(),
        }
    }
}

fn default_dedupe_window_secs() -> u64 {
    3600 // 1 hour
}
