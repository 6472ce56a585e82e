// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value runtime settings.

use botfleet_core::BotfleetError;
use rusqlite::params;

use crate::database::Database;

/// Setting key for the conversation context token budget.
pub const MAX_CONTEXT_TOKENS: &str = "MAX_CONTEXT_TOKENS";

/// Read a setting value, `None` when unset.
pub async fn get_setting(db: &Database, key: &str) -> Result<Option<String>, BotfleetError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(value)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Upsert a setting value.
pub async fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), BotfleetError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn get_set_and_overwrite() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        assert!(get_setting(&db, MAX_CONTEXT_TOKENS).await.unwrap().is_none());

        set_setting(&db, MAX_CONTEXT_TOKENS, "4000").await.unwrap();
        assert_eq!(
            get_setting(&db, MAX_CONTEXT_TOKENS).await.unwrap().as_deref(),
            Some("4000")
        );

        set_setting(&db, MAX_CONTEXT_TOKENS, "6000").await.unwrap();
        assert_eq!(
            get_setting(&db, MAX_CONTEXT_TOKENS).await.unwrap().as_deref(),
            Some("6000")
        );

        db.close().await.unwrap();
    }
}
