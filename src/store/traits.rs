//! `JobStore` trait — async interface over the persistent key-value store.
//!
//! The store is the source of truth for bans, guild settings, and reminder
//! jobs. The in-process [`crate::cache::SharedCache`] is a best-effort
//! mirror of the first two; reminder jobs are read from the store directly
//! on every scheduler tick.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Per-guild settings, stored under `/settings/{guildId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildSettings {
    /// Command prefix override. `None` falls back to the default prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// A persisted reminder job, stored under `/remindJobs/{jobId}`.
///
/// Created outside the core when a user schedules a reminder. The scheduler
/// only ever increments `retry_times` (by exactly 1 per failed attempt) or
/// deletes the record on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemindJob {
    /// Scheduled fire time, unix milliseconds.
    pub remind_at: i64,
    /// Bot user id that owns this job.
    pub client_id: String,
    pub guild_id: String,
    pub channel_id: String,
    /// The message the reminder points back to.
    pub message_id: String,
    /// The user to notify.
    pub user_id: String,
    /// Channel the reminder was requested from.
    pub response_channel_id: String,
    #[serde(default)]
    pub retry_times: u32,
    #[serde(default)]
    pub is_test: bool,
}

/// Backend-agnostic store trait covering bans, settings, and reminder jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All ban records: user-or-guild id to reason string.
    async fn bans(&self) -> Result<HashMap<String, String>, StoreError>;

    /// Write a ban record at `/banned/{id}`.
    async fn set_ban(&self, id: &str, reason: &str) -> Result<(), StoreError>;

    /// All per-guild settings.
    async fn all_settings(&self) -> Result<HashMap<String, GuildSettings>, StoreError>;

    /// All reminder jobs, keyed and ordered by job id.
    async fn remind_jobs(&self) -> Result<BTreeMap<String, RemindJob>, StoreError>;

    /// Point write of `/remindJobs/{jobId}/retryTimes`.
    async fn set_retry_times(&self, job_id: &str, retry_times: u32) -> Result<(), StoreError>;

    /// Delete `/remindJobs/{jobId}`.
    async fn delete_remind_job(&self, job_id: &str) -> Result<(), StoreError>;
}
