// SPDX-FileCopyrightText: 2026 Botfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Botfleet workspace.
//!
//! These are plain data records: the processing-state audit trail, chat
//! messages, bots and their threads, queue jobs, and the effect descriptions
//! produced by domain logic for later execution.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Name of the single message-processing job. Fresh updates and retry
/// triggers both run through it, distinguished by their [`JobPayload`].
pub const PROCESS_UPDATE_JOB: &str = "process-update";

/// Where an inbound message currently sits in the generate-and-deliver
/// pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Recorded, not yet picked up by a worker.
    Received,
    /// A worker is generating or delivering the reply.
    Processing,
    /// A transient failure occurred; the job will be retried.
    Failed,
    /// Gave up for good. Absorbing state.
    Terminal,
    /// Reply generated and delivered. Absorbing state.
    Completed,
}

/// Durable per-message processing record, keyed by the inbound message id.
///
/// Created lazily on first touch and never deleted: it is the permanent
/// audit trail for that message. All mutations go through the named
/// transitions on the processing-state store, never raw field updates.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingState {
    pub user_message_id: String,
    pub status: ProcessingStatus,
    /// Bumped on every transition into `Processing` and on every recorded
    /// failure.
    pub attempts: i64,
    pub last_error: Option<String>,
    pub last_error_at: Option<String>,
    /// Set only when status becomes `Terminal`; distinguishes a deliberate
    /// refusal from exhausted retries.
    pub terminal_reason: Option<String>,
    /// Id of the generated reply message, once one has been persisted.
    pub response_message_id: Option<String>,
    pub incoming_channel_message_id: Option<i64>,
    pub outgoing_channel_message_id: Option<i64>,
    pub channel_update_id: Option<i64>,
    /// Generation and delivery completion are tracked independently: a reply
    /// can exist but not yet be sent after a crash between the two steps.
    pub response_generated_at: Option<String>,
    pub response_sent_at: Option<String>,
    /// Accumulated cost of the generation call.
    pub price: Option<f64>,
    /// Opaque provider payload stored for audit, never parsed here.
    pub raw_response: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A message in a conversation thread.
///
/// A message with a user id and no bot id was authored by the channel user;
/// the reverse means the bot authored it. A bot-authored message may be
/// rewritten in place while its reply is still streaming; user messages are
/// immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub bot_id: Option<String>,
    pub user_id: Option<String>,
    /// Authored through the admin tooling rather than the channel; excluded
    /// from generation context.
    pub from_admin: bool,
    pub text: String,
    /// The channel's own id for this message, once known.
    pub channel_message_id: Option<i64>,
    pub created_at: String,
}

impl ChatMessage {
    /// True when the channel user authored this message.
    pub fn is_user(&self) -> bool {
        self.user_id.is_some() && self.bot_id.is_none()
    }

    /// True when the bot authored this message.
    pub fn is_assistant(&self) -> bool {
        self.bot_id.is_some() && self.user_id.is_none()
    }
}

/// Speaker role in a model-ready transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

/// One turn of a model-ready conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: TranscriptRole,
    pub text: String,
}

/// How a bot receives channel updates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Webhook,
    Polling,
}

/// A managed chat bot.
#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    pub id: String,
    pub name: String,
    pub delivery_mode: DeliveryMode,
    pub enabled: bool,
    /// Model identifier used for generation (and tokenizer selection).
    pub model: String,
    /// System prompt prepended to every generation call.
    pub prompt: Option<String>,
    pub start_text: Option<String>,
    pub help_text: Option<String>,
    pub error_text: Option<String>,
    /// Last fatal/terminal failure observed for this bot, for operator
    /// visibility.
    pub last_error: Option<String>,
    pub created_at: String,
}

impl Bot {
    /// Effects needed to bring channel delivery in line with `enabled`.
    ///
    /// Enabling a webhook bot registers its webhook; a polling bot starts
    /// its poller. Disabling yields the inverse. The decision is data-only;
    /// execution happens in the effect runner.
    pub fn delivery_effects(&self) -> Vec<Effect> {
        match (self.enabled, self.delivery_mode) {
            (true, DeliveryMode::Webhook) => vec![Effect::EnsureWebhook {
                bot_id: self.id.clone(),
            }],
            (true, DeliveryMode::Polling) => vec![Effect::StartPolling {
                bot_id: self.id.clone(),
            }],
            (false, DeliveryMode::Webhook) => vec![Effect::RemoveWebhook {
                bot_id: self.id.clone(),
            }],
            (false, DeliveryMode::Polling) => vec![Effect::StopPolling {
                bot_id: self.id.clone(),
            }],
        }
    }
}

/// A conversation thread between one bot and one channel chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: String,
    pub bot_id: String,
    /// The channel's chat identifier.
    pub chat_id: i64,
    /// Opaque provider-side response id allowing the next request in this
    /// thread to continue context statelessly.
    pub continuation_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A side effect described as data, executed later by the effect runner.
///
/// Effects carry no behavior. Domain logic produces them in response to
/// state changes; the runner executes them sequentially against the
/// external clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    EnsureWebhook { bot_id: String },
    RemoveWebhook { bot_id: String },
    StartPolling { bot_id: String },
    StopPolling { bot_id: String },
    PublishJob { payload: JobPayload },
    AdminAlert { text: String, dedupe_key: Option<String> },
}

/// Payload of a message-processing job.
///
/// A fresh channel update carries its full identifiers so the handler can
/// correlate the stored message; a retry trigger carries only the message id,
/// forcing the worker to reload everything from the store instead of trusting
/// possibly-stale embedded data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    ChannelUpdate {
        user_message_id: String,
        bot_id: String,
        chat_id: i64,
        channel_update_id: Option<i64>,
        incoming_channel_message_id: Option<i64>,
        raw_update: serde_json::Value,
    },
    Trigger {
        user_message_id: String,
    },
}

impl JobPayload {
    /// The inbound message this job is about, regardless of shape.
    pub fn user_message_id(&self) -> &str {
        match self {
            JobPayload::ChannelUpdate {
                user_message_id, ..
            }
            | JobPayload::Trigger { user_message_id } => user_message_id,
        }
    }
}

/// Options accepted by [`crate::traits::JobQueue::publish`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Higher runs first.
    pub priority: i64,
    /// Delay before the job becomes fetchable, in seconds.
    pub start_after_secs: u64,
    /// Number of retries after the first attempt.
    pub retry_limit: i64,
    /// Exponential backoff between retries instead of immediate requeue.
    pub retry_backoff: bool,
    /// Processing lease: a claimed job not completed within this window is
    /// eligible to be claimed again.
    pub expire_in_secs: u64,
    /// At most one pending job per key.
    pub singleton_key: Option<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            start_after_secs: 0,
            retry_limit: 3,
            retry_backoff: true,
            expire_in_secs: 300,
            singleton_key: None,
        }
    }
}

/// A row in the durable job queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: i64,
    pub name: String,
    /// JSON-serialized [`JobPayload`].
    pub payload: String,
    pub status: String,
    pub priority: i64,
    pub retry_count: i64,
    pub retry_limit: i64,
    pub retry_backoff: bool,
    pub singleton_key: Option<String>,
    pub start_after: String,
    pub expire_in_secs: i64,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// True when the current attempt is the last one the retry policy
    /// allows; one more failure parks the job as failed.
    pub fn on_last_attempt(&self) -> bool {
        self.retry_count >= self.retry_limit
    }
}

/// Request to the generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// System prompt, when the bot configures one.
    pub prompt: Option<String>,
    /// The inbound message text being answered.
    pub message_text: String,
    /// Prior conversation, oldest first.
    pub context: Vec<TranscriptMessage>,
    pub model: String,
    /// Channel user identifier, forwarded for provider-side attribution.
    pub user: Option<String>,
    /// Provider-side response id of the previous turn, when continuing.
    pub continuation_token: Option<String>,
}

/// One event from a streaming generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// Incremental text.
    Delta { text: String },
    /// Stream finished; carries cost, the provider's response id for
    /// continuation, and the raw provider payload for audit.
    Completed {
        price: f64,
        continuation_id: Option<String>,
        raw_response: serde_json::Value,
    },
}

/// Full response from a non-streaming generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResponse {
    pub text: String,
    pub price: f64,
    pub continuation_id: Option<String>,
    pub raw_response: serde_json::Value,
}
