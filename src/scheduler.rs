//! Reminder scheduler — bounded-retry delivery of due reminder jobs.
//!
//! Each tick scans the job store for due, not-yet-exhausted jobs owned by
//! this client identity and attempts delivery sequentially. Success deletes
//! the job; any failure increments its retry counter by exactly 1. A job
//! whose counter exceeds the bound is simply never selected again and stays
//! dormant in the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::audit::{AuditLogger, AuditRecord};
use crate::error::ClientError;
use crate::platform::{
    ChannelInfo, ChatClient, GuildInfo, MessageInfo, escape_markdown, message_url,
};
use crate::store::{JobStore, RemindJob};

/// Reserved placeholder key that must never be processed as a job.
pub const PLACEHOLDER_JOB_ID: &str = "_";

/// Audit status color for successful reminder deliveries.
const REMIND_COLOR: u32 = 0xFFC078;

/// Confirmation reaction attached to a delivered reminder.
const CONFIRM_EMOJI: &str = "\u{2705}";

/// Drives reminder delivery against the job store.
pub struct RemindScheduler {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn JobStore>,
    audit: Arc<AuditLogger>,
    max_retry_times: u32,
}

impl RemindScheduler {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn JobStore>,
        audit: Arc<AuditLogger>,
        max_retry_times: u32,
    ) -> Self {
        Self {
            client,
            store,
            audit,
            max_retry_times,
        }
    }

    /// Run one tick: attempt every eligible job, in job-id order.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let jobs = match self.store.remind_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Failed to read remind jobs; skipping tick");
                return;
            }
        };

        let now_ms = now.timestamp_millis();
        for (job_id, job) in &jobs {
            if !is_eligible(
                job_id,
                job,
                self.client.current_user_id(),
                now_ms,
                self.max_retry_times,
            ) {
                continue;
            }

            let content = format!(
                "[`{}`] Execute remind job `{}`",
                now.format("%H:%M:%S"),
                job_id,
            );
            let record = AuditRecord {
                content,
                guild_id: Some(job.guild_id.clone()),
                channel_id: Some(job.channel_id.clone()),
                user_id: Some(job.user_id.clone()),
                ..AuditRecord::default()
            };

            match self.attempt(job).await {
                Ok(()) => {
                    self.audit
                        .ship(AuditRecord {
                            color: Some(REMIND_COLOR),
                            ..record
                        })
                        .await;
                    if let Err(e) = self.store.delete_remind_job(job_id).await {
                        warn!(job_id = %job_id, error = %e, "Failed to delete delivered remind job");
                    }
                }
                Err(e) => {
                    if let Err(write_err) =
                        self.store.set_retry_times(job_id, job.retry_times + 1).await
                    {
                        warn!(job_id = %job_id, error = %write_err, "Failed to bump retry counter");
                    }
                    self.audit
                        .ship(AuditRecord {
                            error: Some(e.to_string()),
                            ..record
                        })
                        .await;
                }
            }
        }
    }

    /// Resolve the job's entities and deliver the notification. Any failure
    /// here counts as one attempt; the confirmation reaction alone is
    /// best-effort and never fails the attempt.
    async fn attempt(&self, job: &RemindJob) -> Result<(), ClientError> {
        let user = self.client.fetch_user(&job.user_id).await?;
        let guild = self.client.fetch_guild(&job.guild_id).await?;
        let channel = self.client.fetch_channel(&job.channel_id).await?;
        if !channel.is_text {
            return Err(ClientError::NotFound {
                what: "text channel",
                id: job.channel_id.clone(),
            });
        }
        let message = self
            .client
            .fetch_message(&job.channel_id, &job.message_id)
            .await?;

        let url = message_url(&job.guild_id, &job.channel_id, &job.message_id);
        let content = remind_text(&message, &guild, &channel, &url);
        let notification = self.client.send_direct_message(&user.id, &content).await?;

        if let Err(e) = self
            .client
            .react(&notification.channel_id, &notification.id, CONFIRM_EMOJI)
            .await
        {
            debug!(error = %e, "Confirmation reaction failed; ignoring");
        }
        Ok(())
    }
}

/// Selection predicate for one job at one tick.
fn is_eligible(
    job_id: &str,
    job: &RemindJob,
    client_id: &str,
    now_ms: i64,
    max_retry_times: u32,
) -> bool {
    job_id != PLACEHOLDER_JOB_ID
        && job.client_id == client_id
        && job.remind_at <= now_ms
        && job.retry_times <= max_retry_times
}

/// Compose the direct-message notification text.
fn remind_text(message: &MessageInfo, guild: &GuildInfo, channel: &ChannelInfo, url: &str) -> String {
    format!(
        "{} `{}` ({} / {})\n{}\n{}",
        escape_markdown(&message.author_name),
        message.created_at.format("%Y-%m-%d %H:%M"),
        escape_markdown(&guild.name),
        escape_markdown(&channel.name),
        message.content,
        url,
    )
}

/// Spawn the fixed-interval tick driver.
///
/// `guard` provides tick-level mutual exclusion: a tick is skipped while the
/// guard is held, and sibling periodic jobs sharing the same guard never
/// overlap this scheduler.
pub fn spawn_tick_loop(
    scheduler: Arc<RemindScheduler>,
    interval: Duration,
    guard: Arc<tokio::sync::Mutex<()>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Ok(_in_flight) = guard.try_lock() else {
                continue;
            };
            scheduler.tick(Utc::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(remind_at: i64, retry_times: u32) -> RemindJob {
        RemindJob {
            remind_at,
            client_id: "bot-1".to_string(),
            guild_id: "g1".to_string(),
            channel_id: "c1".to_string(),
            message_id: "m1".to_string(),
            user_id: "u1".to_string(),
            response_channel_id: "c1".to_string(),
            retry_times,
            is_test: false,
        }
    }

    #[test]
    fn due_job_is_eligible() {
        assert!(is_eligible("job-1", &job(1000, 0), "bot-1", 1000, 2));
        assert!(is_eligible("job-1", &job(999, 2), "bot-1", 1000, 2));
    }

    #[test]
    fn placeholder_key_is_skipped() {
        assert!(!is_eligible(PLACEHOLDER_JOB_ID, &job(0, 0), "bot-1", 1000, 2));
    }

    #[test]
    fn other_clients_jobs_are_skipped() {
        assert!(!is_eligible("job-1", &job(0, 0), "bot-2", 1000, 2));
    }

    #[test]
    fn future_job_is_not_due() {
        assert!(!is_eligible("job-1", &job(1001, 0), "bot-1", 1000, 2));
    }

    #[test]
    fn exhausted_job_is_never_selected() {
        assert!(!is_eligible("job-1", &job(0, 3), "bot-1", 1000, 2));
    }

    #[test]
    fn remind_text_escapes_names_but_not_content() {
        let message = MessageInfo {
            id: "m1".to_string(),
            channel_id: "c1".to_string(),
            guild_id: Some("g1".to_string()),
            author_name: "some_user".to_string(),
            content: "check *this* out".to_string(),
            created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            url: "https://example.com/g1/c1/m1".to_string(),
        };
        let guild = GuildInfo {
            id: "g1".to_string(),
            name: "guild*name".to_string(),
        };
        let channel = ChannelInfo {
            id: "c1".to_string(),
            name: "general".to_string(),
            is_text: true,
        };
        let text = remind_text(&message, &guild, &channel, &message.url);
        assert!(text.contains("some\\_user"));
        assert!(text.contains("guild\\*name"));
        assert!(text.contains("check *this* out"));
        assert!(text.ends_with("https://example.com/g1/c1/m1"));
    }
}
