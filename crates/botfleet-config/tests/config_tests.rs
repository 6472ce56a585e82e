// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for config loading, overrides, and diagnostics.

use botfleet_config::{load_and_validate_str, load_config_from_str, ConfigError};

#[test]
fn empty_config_uses_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.worker.team_size, 2);
    assert_eq!(config.worker.poll_interval_ms, 500);
    assert_eq!(config.worker.retry_limit, 3);
    assert!(config.worker.retry_backoff);
    assert_eq!(config.worker.log_level, "info");
    assert_eq!(config.generation.default_model, "gpt-4o");
    assert_eq!(config.generation.max_context_tokens, 5000);
    assert_eq!(config.alerts.dedupe_window_secs, 3600);
    assert!(config.storage.wal_mode);
}

#[test]
fn toml_overrides_defaults() {
    let config = load_config_from_str(
        r#"
        [worker]
        team_size = 8
        retry_backoff = false

        [generation]
        default_model = "gpt-4o-mini"
        max_context_tokens = 2000

        [storage]
        database_path = "/tmp/fleet.db"
        "#,
    )
    .unwrap();
    assert_eq!(config.worker.team_size, 8);
    assert!(!config.worker.retry_backoff);
    assert_eq!(config.generation.default_model, "gpt-4o-mini");
    assert_eq!(config.generation.max_context_tokens, 2000);
    assert_eq!(config.storage.database_path, "/tmp/fleet.db");
}

#[test]
fn unknown_key_is_rejected_with_suggestion() {
    let result = load_and_validate_str(
        r#"
        [worker]
        taem_size = 4
        "#,
    );
    let errors = result.unwrap_err();
    assert!(!errors.is_empty());
    let rendered = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(rendered.contains("taem_size"), "got: {rendered}");
}

#[test]
fn wrong_type_is_rejected() {
    let result = load_and_validate_str(
        r#"
        [worker]
        team_size = "lots"
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn validation_errors_surface_through_load() {
    let result = load_and_validate_str(
        r#"
        [worker]
        team_size = 0
        "#,
    );
    let errors = result.unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn unknown_section_is_rejected() {
    let result = load_and_validate_str(
        r#"
        [telemetry]
        enabled = true
        "#,
    );
    assert!(result.is_err());
}
