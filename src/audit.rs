//! Audit logging pipeline.
//!
//! Builds one structured record per observable event (command outcome,
//! reminder attempt) and ships it to an external sink. Shipping is
//! fire-and-forget: a sink failure is logged locally and swallowed, never
//! raised back into the caller's flow.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ClientError;
use crate::platform::{
    ChannelInfo, ChatClient, Embed, EmbedField, EmbedFooter, GuildInfo, UserInfo, escape_markdown,
};

/// Embed color for records carrying an error.
pub const ERROR_COLOR: u32 = 0xFF6B6B;

/// Placeholder for entities that could not be resolved.
const UNRESOLVED: &str = "--";

/// A single audit record. Transient: shipped once and discarded.
#[derive(Debug, Clone, Default)]
pub struct AuditRecord {
    pub content: String,
    /// Pre-built embeds shipped ahead of the status embed.
    pub embeds: Vec<Embed>,
    pub error: Option<String>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
    /// Command processing time, when measured.
    pub process_time_ms: Option<i64>,
    /// Status color for successful records. Errors always use `ERROR_COLOR`.
    pub color: Option<u32>,
}

/// External sink accepting a text message plus structured embeds.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn ship(&self, content: &str, embeds: &[Embed]) -> Result<(), ClientError>;
}

/// Webhook-style audit sink.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AuditSink for WebhookSink {
    async fn ship(&self, content: &str, embeds: &[Embed]) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "content": content,
            "embeds": embeds,
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::UnexpectedStatus {
                what: "webhook".to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Assembles audit records and ships them to the sink.
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    client: Arc<dyn ChatClient>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, client: Arc<dyn ChatClient>) -> Self {
        Self { sink, client }
    }

    /// Ship one record. Entity resolution is best-effort and sink failures
    /// are swallowed; this method cannot fail.
    pub async fn ship(&self, record: AuditRecord) {
        let guild = match &record.guild_id {
            Some(id) => self.client.fetch_guild(id).await.ok(),
            None => None,
        };
        let channel = match &record.channel_id {
            Some(id) => self.client.fetch_channel(id).await.ok(),
            None => None,
        };
        let user = match &record.user_id {
            Some(id) => self.client.fetch_user(id).await.ok(),
            None => None,
        };

        let mut embeds = record.embeds.clone();
        embeds.push(status_embed(
            &record,
            guild.as_ref(),
            channel.as_ref(),
            user.as_ref(),
        ));

        if let Err(e) = self.sink.ship(&record.content, &embeds).await {
            warn!(error = %e, "Failed to ship audit record");
        }
    }
}

/// Build the structured status embed appended to every record.
pub fn status_embed(
    record: &AuditRecord,
    guild: Option<&GuildInfo>,
    channel: Option<&ChannelInfo>,
    user: Option<&UserInfo>,
) -> Embed {
    let status = match &record.error {
        Some(error) => format!("```{error}```"),
        None => "SUCCESS".to_string(),
    };
    let guild_value = match guild {
        Some(g) => format!("{}\n{}", g.id, escape_markdown(&g.name)),
        None => UNRESOLVED.to_string(),
    };
    let channel_value = match channel {
        Some(c) if c.is_text => format!("{}\n{}", c.id, escape_markdown(&c.name)),
        Some(c) => c.id.clone(),
        None => UNRESOLVED.to_string(),
    };
    let user_value = match user {
        Some(u) => format!("{}\n{}", u.id, escape_markdown(&u.tag)),
        None => UNRESOLVED.to_string(),
    };

    Embed {
        color: match &record.error {
            Some(_) => Some(ERROR_COLOR),
            None => record.color,
        },
        fields: vec![
            EmbedField::new("Status", status, false),
            EmbedField::new("Guild", guild_value, true),
            EmbedField::new("Channel", channel_value, true),
            EmbedField::new("User", user_value, true),
        ],
        footer: record.process_time_ms.map(|ms| EmbedFooter {
            text: format!("{ms} ms"),
        }),
        ..Embed::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_error(error: Option<&str>) -> AuditRecord {
        AuditRecord {
            content: "test".to_string(),
            error: error.map(String::from),
            ..AuditRecord::default()
        }
    }

    #[test]
    fn success_record_has_success_status() {
        let embed = status_embed(&record_with_error(None), None, None, None);
        assert_eq!(embed.fields[0].name, "Status");
        assert_eq!(embed.fields[0].value, "SUCCESS");
        assert_eq!(embed.color, None);
    }

    #[test]
    fn error_record_has_error_block_and_color() {
        let embed = status_embed(&record_with_error(Some("boom")), None, None, None);
        assert_eq!(embed.fields[0].value, "```boom```");
        assert_eq!(embed.color, Some(ERROR_COLOR));
    }

    #[test]
    fn unresolved_entities_use_placeholder() {
        let embed = status_embed(&record_with_error(None), None, None, None);
        assert_eq!(embed.fields[1].value, "--");
        assert_eq!(embed.fields[2].value, "--");
        assert_eq!(embed.fields[3].value, "--");
    }

    #[test]
    fn resolved_entities_are_escaped() {
        let guild = GuildInfo {
            id: "g1".to_string(),
            name: "my*guild".to_string(),
        };
        let channel = ChannelInfo {
            id: "c1".to_string(),
            name: "general".to_string(),
            is_text: true,
        };
        let user = UserInfo {
            id: "u1".to_string(),
            tag: "user_one#1234".to_string(),
        };
        let embed = status_embed(
            &record_with_error(None),
            Some(&guild),
            Some(&channel),
            Some(&user),
        );
        assert_eq!(embed.fields[1].value, "g1\nmy\\*guild");
        assert_eq!(embed.fields[2].value, "c1\ngeneral");
        assert_eq!(embed.fields[3].value, "u1\nuser\\_one#1234");
    }

    #[test]
    fn non_text_channel_keeps_id_only() {
        let channel = ChannelInfo {
            id: "c2".to_string(),
            name: "voice".to_string(),
            is_text: false,
        };
        let embed = status_embed(&record_with_error(None), None, Some(&channel), None);
        assert_eq!(embed.fields[2].value, "c2");
    }

    #[test]
    fn process_time_footer() {
        let mut record = record_with_error(None);
        record.process_time_ms = Some(42);
        let embed = status_embed(&record, None, None, None);
        assert_eq!(embed.footer.unwrap().text, "42 ms");
    }

    #[test]
    fn explicit_color_kept_on_success() {
        let mut record = record_with_error(None);
        record.color = Some(0xFFC078);
        let embed = status_embed(&record, None, None, None);
        assert_eq!(embed.color, Some(0xFFC078));
    }
}
