// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths and positive pool sizes.

use crate::diagnostic::ConfigError;
use crate::model::BotfleetConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &BotfleetConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.worker.team_size == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.team_size must be at least 1".to_string(),
        });
    }

    if config.worker.poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.poll_interval_ms must be at least 1".to_string(),
        });
    }

    if config.worker.retry_limit < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "worker.retry_limit must be non-negative, got {}",
                config.worker.retry_limit
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.generation.default_model.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "generation.default_model must not be empty".to_string(),
        });
    }

    if config.generation.max_context_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "generation.max_context_tokens must be positive".to_string(),
        });
    }

    if config.alerts.dedupe_window_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "alerts.dedupe_window_secs must be positive".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
