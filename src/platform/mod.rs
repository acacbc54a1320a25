//! Chat-platform abstraction: domain types and the `ChatClient` seam.
//!
//! Everything the core needs from the platform goes through [`ChatClient`],
//! so the router and scheduler can be driven by a mock in tests and by the
//! REST implementation in production.

pub mod gateway;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ClientError;

/// Hard platform limit for one message's content.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// An inbound message event from the gateway.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub id: String,
    /// Absent for direct messages.
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A resolved user.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    /// Human-readable handle, e.g. `someone#1234` or a plain username.
    pub tag: String,
}

/// A resolved guild.
#[derive(Debug, Clone)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
}

/// A resolved channel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    /// Whether plain messages can be sent to this channel.
    pub is_text: bool,
}

/// A fetched or just-sent message.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    /// Display name of the author (guild nickname when available).
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

/// A rich-embed payload attached to an outgoing message.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

/// A name/value field inside an embed.
#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Embed footer text.
#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Async client seam over the chat platform's lookup and delivery operations.
///
/// All operations are fallible; callers decide whether a failure is retried
/// (reminder attempts), reported (command responses), or swallowed
/// (reactions, audit shipping).
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// The bot's own user id.
    fn current_user_id(&self) -> &str;

    async fn fetch_user(&self, user_id: &str) -> Result<UserInfo, ClientError>;

    async fn fetch_guild(&self, guild_id: &str) -> Result<GuildInfo, ClientError>;

    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ClientError>;

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<MessageInfo, ClientError>;

    /// Send one message (at most `MAX_MESSAGE_LENGTH` of content) to a channel.
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        embed: Option<&Embed>,
    ) -> Result<MessageInfo, ClientError>;

    /// Send a direct message to a user.
    async fn send_direct_message(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<MessageInfo, ClientError>;

    /// Attach a reaction to a message.
    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError>;
}

/// Canonical link to a message.
pub fn message_url(guild_id: &str, channel_id: &str, message_id: &str) -> String {
    format!("https://discord.com/channels/{guild_id}/{channel_id}/{message_id}")
}

/// Escape markdown control characters in user-supplied names.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_' | '~' | '`' | '|' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split `text` into chunks of at most `limit` characters, preferring to
/// break on spaces. A single overlong word is hard-split at a char boundary.
pub fn split_content(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let mut word = word;
        // Hard-split words that alone exceed the limit.
        while word.len() > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut end = limit;
            while !word.is_char_boundary(end) {
                end -= 1;
            }
            chunks.push(word[..end].to_string());
            word = &word[end..];
        }
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if needed > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_markdown_control_chars() {
        assert_eq!(escape_markdown("a*b_c`d"), "a\\*b\\_c\\`d");
        assert_eq!(escape_markdown("plain name"), "plain name");
    }

    #[test]
    fn split_short_content_untouched() {
        assert_eq!(split_content("hello world", 2000), vec!["hello world"]);
    }

    #[test]
    fn split_breaks_on_spaces() {
        let text = "aaa bbb ccc ddd";
        let chunks = split_content(text, 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
        for chunk in &chunks {
            assert!(chunk.len() <= 7);
        }
    }

    #[test]
    fn split_hard_breaks_overlong_word() {
        let text = "x".repeat(25);
        let chunks = split_content(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
