// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-message processing state store.
//!
//! Every mutation is a named transition, never a raw field update, so the
//! row doubles as an audit trail. `Completed` and `Terminal` are absorbing:
//! the transition SQL guards against regressing out of them, which is what
//! makes at-least-once job delivery safe to replay.

use std::str::FromStr;

use botfleet_core::BotfleetError;
use rusqlite::params;

use crate::database::{now_timestamp, Database};
use crate::models::{ProcessingState, ProcessingStatus};

const COLUMNS: &str = "user_message_id, status, attempts, last_error, last_error_at,
    terminal_reason, response_message_id, incoming_channel_message_id,
    outgoing_channel_message_id, channel_update_id, response_generated_at,
    response_sent_at, price, raw_response, created_at, updated_at";

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessingState> {
    let status_text: String = row.get(1)?;
    let status = ProcessingStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ProcessingState {
        user_message_id: row.get(0)?,
        status,
        attempts: row.get(2)?,
        last_error: row.get(3)?,
        last_error_at: row.get(4)?,
        terminal_reason: row.get(5)?,
        response_message_id: row.get(6)?,
        incoming_channel_message_id: row.get(7)?,
        outgoing_channel_message_id: row.get(8)?,
        channel_update_id: row.get(9)?,
        response_generated_at: row.get(10)?,
        response_sent_at: row.get(11)?,
        price: row.get(12)?,
        raw_response: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Returns the existing record, or atomically creates one in `received`
/// with zero attempts. Exactly one row ever exists per message id.
pub async fn get_or_create(
    db: &Database,
    user_message_id: &str,
) -> Result<ProcessingState, BotfleetError> {
    let id = user_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO processing_states (user_message_id) VALUES (?1)
                 ON CONFLICT(user_message_id) DO NOTHING",
                params![id],
            )?;
            let state = conn.query_row(
                &format!("SELECT {COLUMNS} FROM processing_states WHERE user_message_id = ?1"),
                params![id],
                row_to_state,
            )?;
            Ok(state)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetches the record, if any.
pub async fn get(
    db: &Database,
    user_message_id: &str,
) -> Result<Option<ProcessingState>, BotfleetError> {
    let id = user_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let state = conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM processing_states WHERE user_message_id = ?1"
                    ),
                    params![id],
                    row_to_state,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(state)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition into `processing`, bumping the attempt counter.
///
/// No-op once the record is completed or terminal.
pub async fn mark_processing(db: &Database, user_message_id: &str) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE processing_states
                 SET status = 'processing', attempts = attempts + 1, updated_at = ?2
                 WHERE user_message_id = ?1 AND status NOT IN ('completed', 'terminal')",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a transient failure. Upserts: the record may not exist yet when
/// the failure happens very early in a job.
pub async fn mark_failed(
    db: &Database,
    user_message_id: &str,
    error_text: &str,
) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let error_text = error_text.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO processing_states
                     (user_message_id, status, attempts, last_error, last_error_at)
                 VALUES (?1, 'failed', 1, ?2, ?3)
                 ON CONFLICT(user_message_id) DO UPDATE SET
                     status = 'failed',
                     attempts = processing_states.attempts + 1,
                     last_error = excluded.last_error,
                     last_error_at = excluded.last_error_at,
                     updated_at = ?3
                 WHERE processing_states.status NOT IN ('completed', 'terminal')",
                params![id, error_text, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Park the record in `terminal`. Upserts; calling twice is safe. A
/// completed record is never demoted.
pub async fn mark_terminal(
    db: &Database,
    user_message_id: &str,
    reason: &str,
) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let reason = reason.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO processing_states (user_message_id, status, terminal_reason)
                 VALUES (?1, 'terminal', ?2)
                 ON CONFLICT(user_message_id) DO UPDATE SET
                     status = 'terminal',
                     terminal_reason = excluded.terminal_reason,
                     updated_at = ?3
                 WHERE processing_states.status != 'completed'",
                params![id, reason, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record that a reply has been generated and persisted. Does not change
/// `status` -- generation and delivery complete independently.
pub async fn mark_response_generated(
    db: &Database,
    user_message_id: &str,
    response_message_id: &str,
    price: Option<f64>,
    raw_response: Option<&str>,
) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let response_message_id = response_message_id.to_string();
    let raw_response = raw_response.map(|s| s.to_string());
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE processing_states
                 SET response_message_id = ?2,
                     response_generated_at = ?3,
                     price = COALESCE(?4, price),
                     raw_response = COALESCE(?5, raw_response),
                     updated_at = ?3
                 WHERE user_message_id = ?1",
                params![id, response_message_id, now, price, raw_response],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record that the reply reached the channel.
pub async fn mark_response_sent(
    db: &Database,
    user_message_id: &str,
    outgoing_channel_message_id: Option<i64>,
) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE processing_states
                 SET response_sent_at = ?2,
                     outgoing_channel_message_id =
                         COALESCE(?3, outgoing_channel_message_id),
                     updated_at = ?2
                 WHERE user_message_id = ?1",
                params![id, now, outgoing_channel_message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition into `completed`. Terminal records stay terminal.
pub async fn mark_completed(db: &Database, user_message_id: &str) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE processing_states
                 SET status = 'completed', updated_at = ?2
                 WHERE user_message_id = ?1 AND status != 'terminal'",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Best-effort enrichment with the channel's own identifiers. Upserts, and
/// never overwrites an already-known id with null.
pub async fn update_channel_ids(
    db: &Database,
    user_message_id: &str,
    incoming_channel_message_id: Option<i64>,
    outgoing_channel_message_id: Option<i64>,
    channel_update_id: Option<i64>,
) -> Result<(), BotfleetError> {
    let id = user_message_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO processing_states
                     (user_message_id, incoming_channel_message_id,
                      outgoing_channel_message_id, channel_update_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_message_id) DO UPDATE SET
                     incoming_channel_message_id =
                         COALESCE(excluded.incoming_channel_message_id,
                                  processing_states.incoming_channel_message_id),
                     outgoing_channel_message_id =
                         COALESCE(excluded.outgoing_channel_message_id,
                                  processing_states.outgoing_channel_message_id),
                     channel_update_id =
                         COALESCE(excluded.channel_update_id,
                                  processing_states.channel_update_id),
                     updated_at = ?5",
                params![
                    id,
                    incoming_channel_message_id,
                    outgoing_channel_message_id,
                    channel_update_id,
                    now
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All records in any of the given statuses, oldest first.
pub async fn find_by_status(
    db: &Database,
    statuses: &[ProcessingStatus],
) -> Result<Vec<ProcessingState>, BotfleetError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let status_texts: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
    db.connection()
        .call(move |conn| {
            let placeholders = (1..=status_texts.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM processing_states
                 WHERE status IN ({placeholders})
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(status_texts.iter()),
                row_to_state,
            )?;
            let mut states = Vec::new();
            for row in rows {
                states.push(row?);
            }
            Ok(states)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Paginated listing, newest first.
pub async fn list(
    db: &Database,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProcessingState>, BotfleetError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM processing_states
                 ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], row_to_state)?;
            let mut states = Vec::new();
            for row in rows {
                states.push(row?);
            }
            Ok(states)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Records stuck in `failed`, for operator recovery tooling.
pub async fn find_failed(db: &Database) -> Result<Vec<ProcessingState>, BotfleetError> {
    find_by_status(db, &[ProcessingStatus::Failed]).await
}

/// Record counts grouped by status, for operator tooling.
pub async fn counts_by_status(db: &Database) -> Result<Vec<(String, i64)>, BotfleetError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM processing_states
                 GROUP BY status ORDER BY status",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
