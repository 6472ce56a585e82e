// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation thread operations.

use botfleet_core::BotfleetError;
use rusqlite::params;

use crate::database::{now_timestamp, Database};
use crate::models::Thread;

const COLUMNS: &str = "id, bot_id, chat_id, continuation_token, created_at, updated_at";

fn row_to_thread(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        bot_id: row.get(1)?,
        chat_id: row.get(2)?,
        continuation_token: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert a new thread.
pub async fn insert(db: &Database, thread: &Thread) -> Result<(), BotfleetError> {
    let thread = thread.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("INSERT INTO threads ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    thread.id,
                    thread.bot_id,
                    thread.chat_id,
                    thread.continuation_token,
                    thread.created_at,
                    thread.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a thread by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Thread>, BotfleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let thread = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM threads WHERE id = ?1"),
                    params![id],
                    row_to_thread,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(thread)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store the provider-side continuation token so the next message in this
/// thread can resume context statelessly.
pub async fn update_continuation_token(
    db: &Database,
    id: &str,
    token: Option<&str>,
) -> Result<(), BotfleetError> {
    let id = id.to_string();
    let token = token.map(|s| s.to_string());
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE threads SET continuation_token = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, token, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Builds a thread record, not yet persisted.
pub fn new_thread(id: &str, bot_id: &str, chat_id: i64) -> Thread {
    let now = now_timestamp();
    Thread {
        id: id.to_string(),
        bot_id: bot_id.to_string(),
        chat_id,
        continuation_token: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::bots;
    use tempfile::tempdir;

    #[tokio::test]
    async fn continuation_token_round_trips() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        bots::insert(&db, &bots::new_bot("b1", "support")).await.unwrap();
        insert(&db, &new_thread("t1", "b1", 42)).await.unwrap();

        let thread = get(&db, "t1").await.unwrap().unwrap();
        assert!(thread.continuation_token.is_none());

        update_continuation_token(&db, "t1", Some("resp_abc"))
            .await
            .unwrap();
        let thread = get(&db, "t1").await.unwrap().unwrap();
        assert_eq!(thread.continuation_token.as_deref(), Some("resp_abc"));

        db.close().await.unwrap();
    }
}
