// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable job queue.
//!
//! Crash-safe lifecycle: `pending` -> `processing` -> `completed`/`failed`.
//! Claiming is a single transaction, so a job is handed to exactly one
//! worker. A claimed job holds a lease (`locked_until`); if the worker dies,
//! the lease expires and the job becomes claimable again, which is the
//! at-least-once delivery guarantee.

use async_trait::async_trait;
use botfleet_core::types::{Job, JobPayload, PublishOptions};
use botfleet_core::{BotfleetError, JobQueue};
use rusqlite::params;
use tracing::debug;

use crate::database::{now_timestamp, timestamp_after, Database};

/// Backoff exponent cap: keeps the retry delay under ~17 minutes.
const MAX_BACKOFF_SHIFT: u32 = 10;

const COLUMNS: &str = "id, name, payload, status, priority, retry_count, retry_limit,
    retry_backoff, singleton_key, start_after, expire_in_secs, locked_until,
    created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        retry_count: row.get(5)?,
        retry_limit: row.get(6)?,
        retry_backoff: row.get(7)?,
        singleton_key: row.get(8)?,
        start_after: row.get(9)?,
        expire_in_secs: row.get(10)?,
        locked_until: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Enqueue a job. Returns the queue entry id.
///
/// With a `singleton_key`, an already-pending job for the same name and key
/// is returned instead of inserting a duplicate.
pub async fn publish(
    db: &Database,
    name: &str,
    payload: &JobPayload,
    options: &PublishOptions,
) -> Result<i64, BotfleetError> {
    let name = name.to_string();
    let payload_json = serde_json::to_string(payload).map_err(|e| BotfleetError::Storage {
        source: Box::new(e),
    })?;
    let options = options.clone();
    let start_after = if options.start_after_secs > 0 {
        timestamp_after(options.start_after_secs)
    } else {
        now_timestamp()
    };

    let id = db
        .connection()
        .call(move |conn| {
            if let Some(key) = &options.singleton_key {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM jobs
                         WHERE name = ?1 AND singleton_key = ?2 AND status = 'pending'",
                        params![name, key],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                if let Some(id) = existing {
                    return Ok(id);
                }
            }

            conn.execute(
                "INSERT INTO jobs
                     (name, payload, priority, retry_limit, retry_backoff,
                      singleton_key, start_after, expire_in_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    name,
                    payload_json,
                    options.priority,
                    options.retry_limit,
                    options.retry_backoff,
                    options.singleton_key,
                    start_after,
                    options.expire_in_secs as i64,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    debug!(job_id = id, "job published");
    Ok(id)
}

/// Claim the next runnable job for `name`.
///
/// Runnable means pending with `start_after` in the past, or processing
/// with an expired lease. Claiming atomically moves the job to `processing`
/// and renews the lease. Returns `None` when nothing is runnable.
pub async fn fetch(db: &Database, name: &str) -> Result<Option<Job>, BotfleetError> {
    let name = name.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {COLUMNS} FROM jobs
                     WHERE name = ?1
                       AND ((status = 'pending' AND start_after <= ?2)
                            OR (status = 'processing'
                                AND locked_until IS NOT NULL
                                AND locked_until <= ?2))
                     ORDER BY priority DESC, id ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![name, now], row_to_job)
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE jobs
                         SET status = 'processing',
                             locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now',
                                                     printf('+%d seconds', expire_in_secs)),
                             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(Job {
                        status: "processing".to_string(),
                        ..job
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing.
pub async fn complete(db: &Database, id: i64) -> Result<(), BotfleetError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'completed', locked_until = NULL, updated_at = ?2
                 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed attempt.
///
/// Within the retry limit the job goes back to `pending`, delayed
/// exponentially when backoff is enabled. Beyond the limit it parks as
/// `failed`.
pub async fn fail(db: &Database, id: i64) -> Result<(), BotfleetError> {
    db.connection()
        .call(move |conn| {
            let (retry_count, retry_limit, retry_backoff): (i64, i64, bool) = conn.query_row(
                "SELECT retry_count, retry_limit, retry_backoff FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            let attempts = retry_count + 1;
            if attempts > retry_limit {
                conn.execute(
                    "UPDATE jobs
                     SET status = 'failed', retry_count = ?2, locked_until = NULL,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, attempts],
                )?;
            } else {
                let delay_secs: i64 = if retry_backoff {
                    1_i64 << (attempts as u32).min(MAX_BACKOFF_SHIFT)
                } else {
                    0
                };
                conn.execute(
                    "UPDATE jobs
                     SET status = 'pending', retry_count = ?2, locked_until = NULL,
                         start_after = strftime('%Y-%m-%dT%H:%M:%fZ', 'now',
                                                printf('+%d seconds', ?3)),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, attempts, delay_secs],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Park a job as `failed` immediately, ignoring remaining retries. Used
/// when the failure class rules out any retry.
pub async fn discard(db: &Database, id: i64) -> Result<(), BotfleetError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs
                 SET status = 'failed',
                     retry_count = retry_count + 1,
                     locked_until = NULL,
                     updated_at = ?2
                 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a job row by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<Job>, BotfleetError> {
    db.connection()
        .call(move |conn| {
            let job = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM jobs WHERE id = ?1"),
                    params![id],
                    row_to_job,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(job)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Job counts grouped by status, for operator tooling.
pub async fn counts_by_status(db: &Database) -> Result<Vec<(String, i64)>, BotfleetError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status",
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

/// [`JobQueue`] publisher over the shared database, for effect execution
/// and anything else that enqueues without holding storage internals.
#[derive(Clone)]
pub struct SqliteJobQueue {
    db: Database,
}

impl SqliteJobQueue {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn publish(
        &self,
        name: &str,
        payload: &JobPayload,
        options: PublishOptions,
    ) -> Result<i64, BotfleetError> {
        publish(&self.db, name, payload, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn trigger(id: &str) -> JobPayload {
        JobPayload::Trigger {
            user_message_id: id.into(),
        }
    }

    #[tokio::test]
    async fn publish_fetch_complete_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = publish(&db, "process-update", &trigger("m1"), &PublishOptions::default())
            .await
            .unwrap();
        assert!(id > 0);

        let job = fetch(&db, "process-update").await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, "processing");
        let payload: JobPayload = serde_json::from_str(&job.payload).unwrap();
        assert_eq!(payload.user_message_id(), "m1");

        // Claimed job is not handed out again while its lease holds.
        assert!(fetch(&db, "process-update").await.unwrap().is_none());

        complete(&db, id).await.unwrap();
        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, "completed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_ignores_other_job_names() {
        let (db, _dir) = setup_db().await;
        publish(&db, "process-update", &trigger("m1"), &PublishOptions::default())
            .await
            .unwrap();
        assert!(fetch(&db, "other-job").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_requeues_until_retry_limit() {
        let (db, _dir) = setup_db().await;
        let options = PublishOptions {
            retry_limit: 2,
            retry_backoff: false,
            ..PublishOptions::default()
        };
        let id = publish(&db, "process-update", &trigger("m1"), &options)
            .await
            .unwrap();

        // Two failures requeue, the third parks the job.
        for expected_count in 1..=2 {
            let job = fetch(&db, "process-update").await.unwrap().unwrap();
            fail(&db, job.id).await.unwrap();
            let job = get(&db, id).await.unwrap().unwrap();
            assert_eq!(job.status, "pending");
            assert_eq!(job.retry_count, expected_count);
        }

        let job = fetch(&db, "process-update").await.unwrap().unwrap();
        fail(&db, job.id).await.unwrap();
        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, "failed");
        assert_eq!(job.retry_count, 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn backoff_delays_the_requeue() {
        let (db, _dir) = setup_db().await;
        let options = PublishOptions {
            retry_limit: 3,
            retry_backoff: true,
            ..PublishOptions::default()
        };
        publish(&db, "process-update", &trigger("m1"), &options)
            .await
            .unwrap();

        let job = fetch(&db, "process-update").await.unwrap().unwrap();
        fail(&db, job.id).await.unwrap();

        // Requeued with start_after in the future, so not immediately fetchable.
        let requeued = get(&db, job.id).await.unwrap().unwrap();
        assert_eq!(requeued.status, "pending");
        assert!(requeued.start_after > now_timestamp());
        assert!(fetch(&db, "process-update").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn discard_parks_regardless_of_remaining_retries() {
        let (db, _dir) = setup_db().await;
        let id = publish(&db, "process-update", &trigger("m1"), &PublishOptions::default())
            .await
            .unwrap();
        let job = fetch(&db, "process-update").await.unwrap().unwrap();
        discard(&db, job.id).await.unwrap();

        let job = get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, "failed");
        assert!(fetch(&db, "process-update").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn singleton_key_deduplicates_pending_jobs() {
        let (db, _dir) = setup_db().await;
        let options = PublishOptions {
            singleton_key: Some("msg:m1".into()),
            ..PublishOptions::default()
        };

        let first = publish(&db, "process-update", &trigger("m1"), &options)
            .await
            .unwrap();
        let second = publish(&db, "process-update", &trigger("m1"), &options)
            .await
            .unwrap();
        assert_eq!(first, second);

        // Once the first is claimed, the key frees up.
        fetch(&db, "process-update").await.unwrap().unwrap();
        let third = publish(&db, "process-update", &trigger("m1"), &options)
            .await
            .unwrap();
        assert_ne!(first, third);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn priority_orders_fetch() {
        let (db, _dir) = setup_db().await;
        let low = publish(&db, "process-update", &trigger("low"), &PublishOptions::default())
            .await
            .unwrap();
        let high = publish(
            &db,
            "process-update",
            &trigger("high"),
            &PublishOptions {
                priority: 10,
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap();

        let first = fetch(&db, "process-update").await.unwrap().unwrap();
        assert_eq!(first.id, high);
        let second = fetch(&db, "process-update").await.unwrap().unwrap();
        assert_eq!(second.id, low);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn start_after_delays_availability() {
        let (db, _dir) = setup_db().await;
        publish(
            &db,
            "process-update",
            &trigger("m1"),
            &PublishOptions {
                start_after_secs: 3600,
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap();

        assert!(fetch(&db, "process-update").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let (db, _dir) = setup_db().await;
        let id = publish(
            &db,
            "process-update",
            &trigger("m1"),
            &PublishOptions {
                expire_in_secs: 0,
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap();

        let first = fetch(&db, "process-update").await.unwrap().unwrap();
        assert_eq!(first.id, id);

        // Zero-second lease: the same job is claimable again, simulating a
        // worker that died mid-processing.
        let reclaimed = fetch(&db, "process-update").await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn trait_publisher_round_trips() {
        let (db, _dir) = setup_db().await;
        let queue = SqliteJobQueue::new(db.clone());
        let id = JobQueue::publish(
            &queue,
            "process-update",
            &trigger("m1"),
            PublishOptions::default(),
        )
        .await
        .unwrap();
        assert!(id > 0);

        let counts = counts_by_status(&db).await.unwrap();
        assert_eq!(counts, vec![("pending".to_string(), 1)]);

        db.close().await.unwrap();
    }
}
