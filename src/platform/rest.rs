//! Discord REST client — `ChatClient` over the HTTP API.
//!
//! Native implementation against the v10 REST surface; every operation is a
//! single authenticated request with JSON in and out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::ClientError;
use crate::platform::{
    ChannelInfo, ChatClient, Embed, GuildInfo, MessageInfo, UserInfo, message_url,
};

const API_BASE: &str = "https://discord.com/api/v10";

/// Channel types that accept plain messages.
const TEXT_CHANNEL_TYPES: &[u64] = &[0, 5];

/// REST client holding the bot token and its own user id.
pub struct DiscordRestClient {
    token: SecretString,
    user_id: String,
    client: reqwest::Client,
}

impl DiscordRestClient {
    pub fn new(token: SecretString, user_id: impl Into<String>) -> Self {
        Self {
            token,
            user_id: user_id.into(),
            client: reqwest::Client::new(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    async fn get_json(
        &self,
        what: &'static str,
        id: &str,
        path: &str,
    ) -> Result<Value, ClientError> {
        let resp = self
            .client
            .get(format!("{API_BASE}{path}"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                what,
                id: id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                what: what.to_string(),
                status: status.as_u16(),
            });
        }
        resp.json().await.map_err(|e| ClientError::Http(e.to_string()))
    }

    async fn post_json(
        &self,
        what: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<Value, ClientError> {
        let resp = self
            .client
            .post(format!("{API_BASE}{path}"))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                what: what.to_string(),
                status: status.as_u16(),
            });
        }
        resp.json().await.map_err(|e| ClientError::Http(e.to_string()))
    }
}

#[async_trait]
impl ChatClient for DiscordRestClient {
    fn current_user_id(&self) -> &str {
        &self.user_id
    }

    async fn fetch_user(&self, user_id: &str) -> Result<UserInfo, ClientError> {
        let value = self
            .get_json("user", user_id, &format!("/users/{user_id}"))
            .await?;
        parse_user(&value)
    }

    async fn fetch_guild(&self, guild_id: &str) -> Result<GuildInfo, ClientError> {
        let value = self
            .get_json("guild", guild_id, &format!("/guilds/{guild_id}"))
            .await?;
        Ok(GuildInfo {
            id: str_field(&value, "id")?,
            name: str_field(&value, "name")?,
        })
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ClientError> {
        let value = self
            .get_json("channel", channel_id, &format!("/channels/{channel_id}"))
            .await?;
        let kind = value.get("type").and_then(Value::as_u64).unwrap_or(0);
        Ok(ChannelInfo {
            id: str_field(&value, "id")?,
            // DM channels carry no name.
            name: value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            is_text: TEXT_CHANNEL_TYPES.contains(&kind),
        })
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<MessageInfo, ClientError> {
        let value = self
            .get_json(
                "message",
                message_id,
                &format!("/channels/{channel_id}/messages/{message_id}"),
            )
            .await?;
        parse_message(&value)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        embed: Option<&Embed>,
    ) -> Result<MessageInfo, ClientError> {
        let mut body = serde_json::json!({ "content": content });
        if let Some(embed) = embed {
            body["embeds"] = serde_json::json!([embed]);
        }
        let value = self
            .post_json(
                "message send",
                &format!("/channels/{channel_id}/messages"),
                &body,
            )
            .await
            .map_err(|e| ClientError::SendFailed {
                channel_id: channel_id.to_string(),
                reason: e.to_string(),
            })?;
        parse_message(&value)
    }

    async fn send_direct_message(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<MessageInfo, ClientError> {
        let dm = self
            .post_json(
                "DM channel",
                "/users/@me/channels",
                &serde_json::json!({ "recipient_id": user_id }),
            )
            .await?;
        let dm_channel_id = str_field(&dm, "id")?;
        self.send_message(&dm_channel_id, content, None).await
    }

    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError> {
        // The emoji lands in a path segment and must be percent-encoded.
        let mut url = url::Url::parse(API_BASE).map_err(|e| ClientError::Http(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Http("cannot-be-a-base url".to_string()))?
            .extend(&[
                "channels", channel_id, "messages", message_id, "reactions", emoji, "@me",
            ]);

        let resp = self
            .client
            .put(url)
            .header("Authorization", self.auth_header())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::UnexpectedStatus {
                what: "reaction".to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

fn str_field(value: &Value, key: &str) -> Result<String, ClientError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| ClientError::InvalidPayload(format!("missing field `{key}`")))
}

fn parse_user(value: &Value) -> Result<UserInfo, ClientError> {
    let id = str_field(value, "id")?;
    let username = str_field(value, "username")?;
    // Legacy accounts still carry a non-zero discriminator.
    let tag = match value.get("discriminator").and_then(Value::as_str) {
        Some(d) if d != "0" && d != "0000" => format!("{username}#{d}"),
        _ => username,
    };
    Ok(UserInfo { id, tag })
}

fn parse_message(value: &Value) -> Result<MessageInfo, ClientError> {
    let id = str_field(value, "id")?;
    let channel_id = str_field(value, "channel_id")?;
    // Only gateway payloads carry guild_id; REST message objects do not.
    let guild_id = value
        .get("guild_id")
        .and_then(Value::as_str)
        .map(String::from);
    let author = value
        .get("author")
        .ok_or_else(|| ClientError::InvalidPayload("missing field `author`".to_string()))?;
    // Prefer the guild nickname when the payload includes member data.
    let author_name = value
        .get("member")
        .and_then(|m| m.get("nick"))
        .and_then(Value::as_str)
        .or_else(|| author.get("global_name").and_then(Value::as_str))
        .or_else(|| author.get("username").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    let created_at = parse_timestamp(value)?;
    let url = message_url(guild_id.as_deref().unwrap_or("@me"), &channel_id, &id);

    Ok(MessageInfo {
        id,
        channel_id,
        guild_id,
        author_name,
        content: value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at,
        url,
    })
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, ClientError> {
    let raw = str_field(value, "timestamp")?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ClientError::InvalidPayload(format!("bad timestamp `{raw}`: {e}")))
}
