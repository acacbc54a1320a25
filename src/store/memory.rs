//! In-memory `JobStore` backend (for tests).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::traits::{GuildSettings, JobStore, RemindJob};

#[derive(Default)]
struct Inner {
    bans: HashMap<String, String>,
    settings: HashMap<String, GuildSettings>,
    jobs: BTreeMap<String, RemindJob>,
}

/// In-memory store backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a reminder job.
    pub async fn insert_remind_job(&self, job_id: impl Into<String>, job: RemindJob) {
        self.inner.write().await.jobs.insert(job_id.into(), job);
    }

    /// Insert or replace a guild's settings.
    pub async fn insert_settings(&self, guild_id: impl Into<String>, settings: GuildSettings) {
        self.inner
            .write()
            .await
            .settings
            .insert(guild_id.into(), settings);
    }

    /// Snapshot of one job, if present.
    pub async fn remind_job(&self, job_id: &str) -> Option<RemindJob> {
        self.inner.read().await.jobs.get(job_id).cloned()
    }

    /// Ban reason for an id, if present.
    pub async fn ban_reason(&self, id: &str) -> Option<String> {
        self.inner.read().await.bans.get(id).cloned()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn bans(&self) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.inner.read().await.bans.clone())
    }

    async fn set_ban(&self, id: &str, reason: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .bans
            .insert(id.to_string(), reason.to_string());
        Ok(())
    }

    async fn all_settings(&self) -> Result<HashMap<String, GuildSettings>, StoreError> {
        Ok(self.inner.read().await.settings.clone())
    }

    async fn remind_jobs(&self) -> Result<BTreeMap<String, RemindJob>, StoreError> {
        Ok(self.inner.read().await.jobs.clone())
    }

    async fn set_retry_times(&self, job_id: &str, retry_times: u32) -> Result<(), StoreError> {
        if let Some(job) = self.inner.write().await.jobs.get_mut(job_id) {
            job.retry_times = retry_times;
        }
        Ok(())
    }

    async fn delete_remind_job(&self, job_id: &str) -> Result<(), StoreError> {
        self.inner.write().await.jobs.remove(job_id);
        Ok(())
    }
}
