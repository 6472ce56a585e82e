// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot repository operations.

use std::str::FromStr;

use botfleet_core::BotfleetError;
use rusqlite::params;

use crate::database::{now_timestamp, Database};
use crate::models::{Bot, DeliveryMode};

const COLUMNS: &str = "id, name, delivery_mode, enabled, model, prompt, start_text,
    help_text, error_text, last_error, created_at";

fn row_to_bot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bot> {
    let mode_text: String = row.get(2)?;
    let delivery_mode = DeliveryMode::from_str(&mode_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Bot {
        id: row.get(0)?,
        name: row.get(1)?,
        delivery_mode,
        enabled: row.get(3)?,
        model: row.get(4)?,
        prompt: row.get(5)?,
        start_text: row.get(6)?,
        help_text: row.get(7)?,
        error_text: row.get(8)?,
        last_error: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Insert a new bot.
pub async fn insert(db: &Database, bot: &Bot) -> Result<(), BotfleetError> {
    let bot = bot.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO bots ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    bot.id,
                    bot.name,
                    bot.delivery_mode.to_string(),
                    bot.enabled,
                    bot.model,
                    bot.prompt,
                    bot.start_text,
                    bot.help_text,
                    bot.error_text,
                    bot.last_error,
                    bot.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a bot by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Bot>, BotfleetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let bot = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM bots WHERE id = ?1"),
                    params![id],
                    row_to_bot,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(bot)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the latest operator-relevant failure on the bot.
pub async fn set_last_error(
    db: &Database,
    id: &str,
    error_text: &str,
) -> Result<(), BotfleetError> {
    let id = id.to_string();
    let error_text = error_text.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET last_error = ?2 WHERE id = ?1",
                params![id, error_text],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Builds an enabled webhook bot with defaults, not yet persisted.
pub fn new_bot(id: &str, name: &str) -> Bot {
    Bot {
        id: id.to_string(),
        name: name.to_string(),
        delivery_mode: DeliveryMode::Webhook,
        enabled: true,
        model: "gpt-4o".to_string(),
        prompt: None,
        start_text: Some("Hello! How can I help?".to_string()),
        help_text: Some("Send me a message and I will answer.".to_string()),
        error_text: Some("Something went wrong, please try again later.".to_string()),
        last_error: None,
        created_at: now_timestamp(),
    }
}
