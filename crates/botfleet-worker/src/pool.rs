// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size polling worker pool over the durable job queue.
//!
//! Each registered job name gets `team_size` independent consumers. There
//! is no cross-job locking on the message id; correctness under duplicate
//! delivery comes from the pipeline's idempotent persistence.

use std::sync::Arc;
use std::time::Duration;

use botfleet_config::model::WorkerConfig;
use botfleet_core::types::{Job, PROCESS_UPDATE_JOB};
use botfleet_core::{classify, BotfleetError, FailureKind};
use botfleet_storage::queries::jobs;
use botfleet_storage::Database;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handles one claimed job.
///
/// Returning `Ok` completes the job. A returned error is classified: a
/// retryable error sends the job back through the queue's retry/backoff
/// policy, anything else parks it as failed with no further attempts.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), BotfleetError>;
}

struct Registration {
    name: String,
    handler: Arc<dyn JobHandler>,
    team_size: usize,
}

/// Polling consumer pool over the jobs table.
pub struct WorkerPool {
    db: Database,
    poll_interval: Duration,
    registrations: Vec<Registration>,
}

impl WorkerPool {
    pub fn new(db: Database, poll_interval: Duration) -> Self {
        Self {
            db,
            poll_interval,
            registrations: Vec::new(),
        }
    }

    /// Builds a pool from worker configuration with `handler` registered
    /// under the standard message-processing job name.
    pub fn from_config(
        db: Database,
        config: &WorkerConfig,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        let mut pool = Self::new(db, Duration::from_millis(config.poll_interval_ms));
        pool.register(PROCESS_UPDATE_JOB, handler, config.team_size);
        pool
    }

    /// Registers `team_size` consumers for a job name.
    pub fn register(&mut self, name: &str, handler: Arc<dyn JobHandler>, team_size: usize) {
        self.registrations.push(Registration {
            name: name.to_string(),
            handler,
            team_size,
        });
    }

    /// Spawns all consumers. They run until `shutdown` is cancelled; an
    /// in-flight job is always finished before a consumer exits.
    pub fn spawn(self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let WorkerPool {
            db,
            poll_interval,
            registrations,
        } = self;

        let mut handles = Vec::new();
        for registration in registrations {
            let handler = registration.handler;
            for worker_index in 0..registration.team_size {
                let db = db.clone();
                let name = registration.name.clone();
                let handler = handler.clone();
                let shutdown = shutdown.clone();
                handles.push(tokio::spawn(async move {
                    info!(job_name = %name, worker_index, "worker started");
                    consumer_loop(db, name, handler, shutdown, poll_interval, worker_index)
                        .await;
                }));
            }
        }
        handles
    }

    /// Spawns all consumers and waits for them to finish after shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        let handles = self.spawn(shutdown);
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn consumer_loop(
    db: Database,
    name: String,
    handler: Arc<dyn JobHandler>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    worker_index: usize,
) {
    loop {
        if shutdown.is_cancelled() {
            info!(job_name = %name, worker_index, "worker stopped");
            return;
        }

        let job = match jobs::fetch(&db, &name).await {
            Ok(job) => job,
            Err(e) => {
                error!(job_name = %name, error = %e, "failed to fetch job");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => continue,
                }
            }
        };

        match job {
            Some(job) => {
                debug!(job_name = %name, job_id = job.id, worker_index, "job claimed");
                settle(&db, &job, handler.handle(&job).await).await;
            }
            None => {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(job_name = %name, worker_index, "worker stopped");
                        return;
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }
}

/// Records the job's outcome in the queue.
async fn settle(db: &Database, job: &Job, outcome: Result<(), BotfleetError>) {
    let result = match outcome {
        Ok(()) => jobs::complete(db, job.id).await,
        Err(error) => {
            let kind = classify(&error);
            error!(job_id = job.id, kind = %kind, error = %error, "job failed");
            match kind {
                FailureKind::Retryable => jobs::fail(db, job.id).await,
                // Fatal and terminal failures are recorded as failed with no
                // further attempts, regardless of remaining retries.
                FailureKind::Fatal | FailureKind::Terminal => jobs::discard(db, job.id).await,
            }
        }
    };
    if let Err(e) = result {
        error!(job_id = job.id, error = %e, "failed to settle job");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfleet_core::types::{JobPayload, ProcessingStatus, PublishOptions, PROCESS_UPDATE_JOB};
    use botfleet_test_utils::TestHarness;

    use crate::handler::UpdateJobHandler;

    fn handler(harness: &TestHarness) -> Arc<UpdateJobHandler> {
        Arc::new(UpdateJobHandler::new(
            harness.db.clone(),
            harness.processor.clone(),
            harness.alerts.clone(),
        ))
    }

    async fn publish_trigger(harness: &TestHarness, id: &str, options: PublishOptions) -> i64 {
        jobs::publish(
            &harness.db,
            PROCESS_UPDATE_JOB,
            &JobPayload::Trigger {
                user_message_id: id.to_string(),
            },
            &options,
        )
        .await
        .unwrap()
    }

    async fn wait_for_job_status(db: &Database, job_id: i64, expected: &str) {
        for _ in 0..100 {
            let job = jobs::get(db, job_id).await.unwrap().unwrap();
            if job.status == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let job = jobs::get(db, job_id).await.unwrap().unwrap();
        panic!("job {job_id} never reached {expected}, still {}", job.status);
    }

    #[tokio::test]
    async fn pool_processes_published_jobs_to_completion() {
        let harness = TestHarness::builder()
            .with_chunks(vec!["an answer from the pool"])
            .with_completion(0.001, None, serde_json::json!({}))
            .build()
            .await
            .unwrap();
        let message_id = harness.seed_incoming("question").await.unwrap();
        let job_id = publish_trigger(&harness, &message_id, PublishOptions::default()).await;

        let mut pool = WorkerPool::new(harness.db.clone(), Duration::from_millis(10));
        pool.register(PROCESS_UPDATE_JOB, handler(&harness), 2);
        let shutdown = CancellationToken::new();
        let handles = pool.spawn(shutdown.clone());

        wait_for_job_status(&harness.db, job_id, "completed").await;
        let state = harness.state(&message_id).await.unwrap();
        assert_eq!(state.status, ProcessingStatus::Completed);

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn retryable_failures_retry_until_the_queue_gives_up() {
        let harness = TestHarness::builder()
            .with_failing_generation("service unavailable", Some(503))
            .build()
            .await
            .unwrap();
        let message_id = harness.seed_incoming("question").await.unwrap();
        let job_id = publish_trigger(
            &harness,
            &message_id,
            PublishOptions {
                retry_limit: 1,
                retry_backoff: false,
                ..PublishOptions::default()
            },
        )
        .await;

        let mut pool = WorkerPool::new(harness.db.clone(), Duration::from_millis(10));
        pool.register(PROCESS_UPDATE_JOB, handler(&harness), 1);
        let shutdown = CancellationToken::new();
        let handles = pool.spawn(shutdown.clone());

        wait_for_job_status(&harness.db, job_id, "failed").await;

        // First attempt plus one retry.
        assert_eq!(harness.generation.call_count(), 2);
        let state = harness.state(&message_id).await.unwrap();
        assert_eq!(state.status, ProcessingStatus::Failed);

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn fatal_failure_fails_the_job_without_retries() {
        let harness = TestHarness::builder()
            .with_failing_generation("unauthorized", Some(401))
            .build()
            .await
            .unwrap();
        let message_id = harness.seed_incoming("question").await.unwrap();
        let job_id = publish_trigger(&harness, &message_id, PublishOptions::default()).await;

        let mut pool = WorkerPool::new(harness.db.clone(), Duration::from_millis(10));
        pool.register(PROCESS_UPDATE_JOB, handler(&harness), 1);
        let shutdown = CancellationToken::new();
        let handles = pool.spawn(shutdown.clone());

        wait_for_job_status(&harness.db, job_id, "failed").await;

        // One attempt, no policy retry, state parked.
        assert_eq!(harness.generation.call_count(), 1);
        let state = harness.state(&message_id).await.unwrap();
        assert_eq!(state.status, ProcessingStatus::Terminal);
        assert_eq!(harness.alerts.notifications().await.len(), 1);

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn from_config_wires_the_standard_job() {
        let harness = TestHarness::builder()
            .with_chunks(vec!["an answer from the configured pool"])
            .with_completion(0.001, None, serde_json::json!({}))
            .build()
            .await
            .unwrap();
        let message_id = harness.seed_incoming("question").await.unwrap();
        let job_id = publish_trigger(&harness, &message_id, PublishOptions::default()).await;

        let config = WorkerConfig {
            team_size: 1,
            poll_interval_ms: 10,
            ..WorkerConfig::default()
        };
        let pool = WorkerPool::from_config(harness.db.clone(), &config, handler(&harness));
        let shutdown = CancellationToken::new();
        let handles = pool.spawn(shutdown.clone());

        wait_for_job_status(&harness.db, job_id, "completed").await;

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let harness = TestHarness::builder().build().await.unwrap();
        let mut pool = WorkerPool::new(harness.db.clone(), Duration::from_millis(10));
        pool.register(PROCESS_UPDATE_JOB, handler(&harness), 3);
        let shutdown = CancellationToken::new();
        let handles = pool.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("worker did not stop")
                .unwrap();
        }
    }
}
