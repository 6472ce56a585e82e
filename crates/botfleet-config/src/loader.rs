// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./botfleet.toml` > `~/.config/botfleet/botfleet.toml`
//! > `/etc/botfleet/botfleet.toml` with environment variable overrides via the
//! `BOTFLEET_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::BotfleetConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/botfleet/botfleet.toml` (system-wide)
/// 3. `~/.config/botfleet/botfleet.toml` (user XDG config)
/// 4. `./botfleet.toml` (local directory)
/// 5. `BOTFLEET_*` environment variables
pub fn load_config() -> Result<BotfleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BotfleetConfig::default()))
        .merge(Toml::file("/etc/botfleet/botfleet.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("botfleet/botfleet.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("botfleet.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<BotfleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BotfleetConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BotfleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BotfleetConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `BOTFLEET_WORKER_TEAM_SIZE` must map to
/// `worker.team_size`, not `worker.team.size`.
fn env_provider() -> Env {
    Env::prefixed("BOTFLEET_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let mapped = key
            .as_str()
            .replacen("worker_", "worker.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("generation_", "generation.", 1)
            .replacen("alerts_", "alerts.", 1);
        mapped.into()
    })
}
