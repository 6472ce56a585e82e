// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat message CRUD operations.

use botfleet_core::BotfleetError;
use rusqlite::params;

use crate::database::{now_timestamp, Database};
use crate::models::ChatMessage;

const COLUMNS: &str =
    "id, thread_id, bot_id, user_id, from_admin, text, channel_message_id, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        bot_id: row.get(2)?,
        user_id: row.get(3)?,
        from_admin: row.get(4)?,
        text: row.get(5)?,
        channel_message_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a new message.
pub async fn insert(db: &Database, msg: &ChatMessage) -> Result<(), BotfleetError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("INSERT INTO messages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    msg.id,
                    msg.thread_id,
                    msg.bot_id,
                    msg.user_id,
                    msg.from_admin,
                    msg.text,
                    msg.channel_message_id,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a message by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<ChatMessage>, BotfleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let msg = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                    params![id],
                    row_to_message,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(msg)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All messages of a thread in chronological order.
pub async fn list_for_thread(
    db: &Database,
    thread_id: &str,
) -> Result<Vec<ChatMessage>, BotfleetError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE thread_id = ?1
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![thread_id], row_to_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite a message's text in place. Only bot-authored messages are ever
/// updated this way, while their reply is still streaming.
pub async fn update_text(db: &Database, id: &str, text: &str) -> Result<(), BotfleetError> {
    let id = id.to_string();
    let text = text.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET text = ?2 WHERE id = ?1",
                params![id, text],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the channel-assigned id once the message has been delivered.
pub async fn set_channel_message_id(
    db: &Database,
    id: &str,
    channel_message_id: i64,
) -> Result<(), BotfleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET channel_message_id = ?2 WHERE id = ?1",
                params![id, channel_message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Builds a bot-authored message for a thread, not yet persisted.
pub fn new_bot_message(thread_id: &str, bot_id: &str, text: &str) -> ChatMessage {
    ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        thread_id: Some(thread_id.to_string()),
        bot_id: Some(bot_id.to_string()),
        user_id: None,
        from_admin: false,
        text: text.to_string(),
        channel_message_id: None,
        created_at: now_timestamp(),
    }
}
