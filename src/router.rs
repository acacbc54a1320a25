//! Command router — turns one inbound message into a dispatched command
//! call and its reported outcome.
//!
//! Flow: drop bots/DMs/banned senders, resolve the guild prefix, parse the
//! command, request admission from the guild gate, run the handler, deliver
//! the response, audit the outcome. Nothing here propagates an error to the
//! caller; every failure ends as a notice, an audit record, or a silent
//! no-op.

use std::sync::Arc;

use rand::seq::SliceRandom;
use regex::Regex;
use tracing::warn;

use crate::audit::{AuditLogger, AuditRecord};
use crate::cache::SharedCache;
use crate::commands::{CommandRegistry, CommandResult, HELP_COMMAND, Invocation};
use crate::commands::help::SUPPORT_SERVER_URL;
use crate::config::BotConfig;
use crate::error::{CommandError, ConfigError};
use crate::gate::{Admission, GuildGate, RejectReason};
use crate::platform::{
    ChatClient, Embed, EmbedFooter, MAX_MESSAGE_LENGTH, MessageEvent, split_content,
};
use crate::store::JobStore;

/// One-time notice when a command arrives while another is processing.
pub const PROCESSING_NOTICE: &str =
    ":star2: The previous command is still processing, hold on a moment...";

/// One-time notice when a command arrives during cooldown.
pub const COOLDOWN_NOTICE: &str = ":ice_cube: Commands are cooling down, slow down a little...";

/// Fixed user-facing apology for handler failures.
pub const APOLOGY: &str =
    ":fire: Something went wrong, please report it in the support server\nhttps://discord.gg/attention-bot";

/// Notice sent once when syntax-error escalation bans a user.
pub const LOCKOUT_NOTICE: &str =
    ":lock: Too many malformed commands. Join the support server and explain what happened to get unlocked.";

const SEND_FAILED: &str = "Error: send responses failed";

const RESPONSE_EMBED_TITLE: &str = "Join the Attention Please support server";
const RESPONSE_EMBED_COLOR: u32 = 0xFF922B;

const HINTS: &[&str] = &[
    "Mention the bot to see the help text.",
    "Each guild can configure its own command prefix.",
    "Reminders are retried up to two times before giving up.",
    "Commands are serialized per guild; wait for the previous one to finish.",
];

/// Dependencies injected into the router.
pub struct RouterDeps {
    pub client: Arc<dyn ChatClient>,
    pub store: Arc<dyn JobStore>,
    pub cache: Arc<SharedCache>,
    pub gate: Arc<GuildGate>,
    pub registry: CommandRegistry,
    pub audit: Arc<AuditLogger>,
    pub config: BotConfig,
}

/// Routes inbound messages to command handlers.
pub struct MessageRouter {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn JobStore>,
    cache: Arc<SharedCache>,
    gate: Arc<GuildGate>,
    registry: CommandRegistry,
    audit: Arc<AuditLogger>,
    config: BotConfig,
    /// Matches a message that is exactly a mention of the bot.
    mention: Regex,
}

impl MessageRouter {
    pub fn new(deps: RouterDeps) -> Result<Self, ConfigError> {
        let pattern = format!("^<@!?{}>$", regex::escape(deps.client.current_user_id()));
        let mention = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
            key: "bot user id".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            client: deps.client,
            store: deps.store,
            cache: deps.cache,
            gate: deps.gate,
            registry: deps.registry,
            audit: deps.audit,
            config: deps.config,
            mention,
        })
    }

    /// Handle one inbound message end to end. Infallible by design.
    pub async fn handle_message(&self, event: MessageEvent) {
        if event.author_is_bot {
            return;
        }
        let content = event.content.trim();
        if content.is_empty() {
            return;
        }
        let Some(guild_id) = event.guild_id.clone() else {
            return;
        };
        if self.cache.is_banned(&event.author_id).await || self.cache.is_banned(&guild_id).await {
            return;
        }

        let prefix = self
            .cache
            .prefix_for(&guild_id, &self.config.default_prefix)
            .await;
        let mentioned = self.mention.is_match(content);
        let Some((name, args)) = parse_command(content, &prefix, mentioned) else {
            return;
        };
        // Unknown command is not an error; ignore silently.
        let Some(handler) = self.registry.get(&name) else {
            return;
        };

        match self.gate.try_enter(&guild_id) {
            Admission::Admitted => {}
            Admission::Rejected(RejectReason::Busy) => {
                self.notify(&event, PROCESSING_NOTICE).await;
                return;
            }
            Admission::Rejected(RejectReason::CoolingDown) => {
                self.notify(&event, COOLDOWN_NOTICE).await;
                return;
            }
            Admission::Rejected(RejectReason::Muted) => {
                return;
            }
        }

        let invocation = Invocation {
            guild_id: guild_id.clone(),
            channel_id: event.channel_id.clone(),
            user_id: event.author_id.clone(),
            message_id: event.id.clone(),
            content: content.to_string(),
            args,
            created_at: event.created_at,
        };

        let result = match handler.execute(&invocation).await {
            Ok(result) if result.is_empty() => failure_result(CommandError::EmptyResult.to_string()),
            Ok(result) => result,
            Err(e) => failure_result(e.to_string()),
        };

        let syntax_error = result.syntax_error;
        self.respond(&event, result).await;

        if syntax_error {
            self.escalate_syntax_error(&event).await;
        }

        self.gate.finish(&guild_id);
    }

    /// Best-effort plain notice to the message's channel.
    async fn notify(&self, event: &MessageEvent, text: &str) {
        if let Err(e) = self.client.send_message(&event.channel_id, text, None).await {
            warn!(channel_id = %event.channel_id, error = %e, "Failed to send notice");
        }
    }

    /// Deliver a command result and audit each delivered part.
    ///
    /// When delivery fails outright, ships a synthetic failure record
    /// documenting what would have been sent, so operators can see failures
    /// that never reached the user.
    async fn respond(&self, event: &MessageEvent, result: CommandResult) {
        let embed = decorate_embed(result.embed.clone());
        let chunks = match &result.content {
            Some(content) => split_content(content, MAX_MESSAGE_LENGTH),
            None => vec![String::new()],
        };

        let mut sent = Vec::new();
        let mut send_error = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let part_embed = (i == 0).then_some(&embed);
            match self
                .client
                .send_message(&event.channel_id, chunk, part_embed)
                .await
            {
                Ok(message) => sent.push(message),
                Err(e) => {
                    send_error = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(send_error) = send_error {
            self.audit
                .ship(AuditRecord {
                    content: format!(
                        "[`{}`] {}\n{}",
                        event.created_at.format("%H:%M:%S"),
                        event.content,
                        SEND_FAILED,
                    ),
                    error: Some(result.error.unwrap_or(send_error)),
                    guild_id: event.guild_id.clone(),
                    channel_id: Some(event.channel_id.clone()),
                    user_id: Some(event.author_id.clone()),
                    ..AuditRecord::default()
                })
                .await;
            return;
        }

        for (i, message) in sent.iter().enumerate() {
            if i == 0 {
                let process_time = message
                    .created_at
                    .signed_duration_since(event.created_at)
                    .num_milliseconds();
                self.audit
                    .ship(AuditRecord {
                        content: format!(
                            "[`{}`] {}\n{}",
                            event.created_at.format("%H:%M:%S"),
                            event.content,
                            message.content,
                        ),
                        embeds: vec![embed.clone()],
                        error: result.error.clone(),
                        guild_id: event.guild_id.clone(),
                        channel_id: Some(event.channel_id.clone()),
                        user_id: Some(event.author_id.clone()),
                        process_time_ms: Some(process_time),
                        ..AuditRecord::default()
                    })
                    .await;
            } else {
                self.audit
                    .ship(AuditRecord {
                        content: message.content.clone(),
                        ..AuditRecord::default()
                    })
                    .await;
            }
        }
    }

    /// Count a syntax error; past the threshold, persist a ban and send the
    /// lockout notice. Subsequent messages from the user are dropped at the
    /// ban check before any routing.
    async fn escalate_syntax_error(&self, event: &MessageEvent) {
        let count = self.cache.record_syntax_error(&event.author_id).await;
        if count <= self.config.syntax_error_threshold {
            return;
        }

        let reason = format!(
            "[{}] too many syntax errors",
            event.created_at.format("%Y-%m-%d %H:%M"),
        );
        if let Err(e) = self.store.set_ban(&event.author_id, &reason).await {
            warn!(user_id = %event.author_id, error = %e, "Failed to persist ban");
        }
        self.cache.set_ban(&event.author_id, &reason).await;
        self.respond(event, CommandResult::text(LOCKOUT_NOTICE)).await;
    }
}

/// Resolve the command name and arguments from raw content.
///
/// Returns `None` when the message is not an invocation at all, or when the
/// prefix is followed by nothing (treated as "no handler").
fn parse_command(content: &str, prefix: &str, mentioned: bool) -> Option<(String, Vec<String>)> {
    if !mentioned && !content.starts_with(prefix) {
        return None;
    }
    let args: Vec<String> = content.split_whitespace().map(String::from).collect();
    let name = if mentioned {
        HELP_COMMAND.to_string()
    } else {
        args.first()?
            .strip_prefix(prefix)
            .unwrap_or_default()
            .to_string()
    };
    if name.is_empty() {
        return None;
    }
    Some((name, args))
}

/// Apply the response embed defaults: support-server title and link, brand
/// color, and a rotating hint footer. Handler-supplied values win.
fn decorate_embed(custom: Option<Embed>) -> Embed {
    let mut embed = custom.unwrap_or_default();
    embed
        .title
        .get_or_insert_with(|| RESPONSE_EMBED_TITLE.to_string());
    embed
        .url
        .get_or_insert_with(|| SUPPORT_SERVER_URL.to_string());
    embed.color.get_or_insert(RESPONSE_EMBED_COLOR);
    embed.footer.get_or_insert_with(|| EmbedFooter {
        text: format!("💡 {}", random_hint()),
    });
    embed
}

fn random_hint() -> &'static str {
    HINTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(HINTS[0])
}

fn failure_result(error: String) -> CommandResult {
    CommandResult {
        content: Some(APOLOGY.to_string()),
        error: Some(error),
        ..CommandResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_unprefixed_content() {
        assert_eq!(parse_command("hello there", "ap!", false), None);
    }

    #[test]
    fn parse_resolves_name_and_args() {
        let (name, args) = parse_command("ap!help   me  now", "ap!", false).unwrap();
        assert_eq!(name, "help");
        assert_eq!(args, vec!["ap!help", "me", "now"]);
    }

    #[test]
    fn parse_collapses_whitespace_and_newlines() {
        let (_, args) = parse_command("ap!help\n one\t two", "ap!", false).unwrap();
        assert_eq!(args, vec!["ap!help", "one", "two"]);
    }

    #[test]
    fn bare_prefix_is_no_command() {
        assert_eq!(parse_command("ap!", "ap!", false), None);
        assert_eq!(parse_command("ap! help", "ap!", false), None);
    }

    #[test]
    fn mention_maps_to_help() {
        let (name, _) = parse_command("<@123>", "ap!", true).unwrap();
        assert_eq!(name, HELP_COMMAND);
    }

    #[test]
    fn decorate_fills_defaults() {
        let embed = decorate_embed(None);
        assert_eq!(embed.title.as_deref(), Some(RESPONSE_EMBED_TITLE));
        assert_eq!(embed.color, Some(RESPONSE_EMBED_COLOR));
        assert!(embed.footer.unwrap().text.starts_with("💡 "));
    }

    #[test]
    fn decorate_keeps_handler_values() {
        let custom = Embed {
            title: Some("Custom".to_string()),
            color: Some(0x123456),
            ..Embed::default()
        };
        let embed = decorate_embed(Some(custom));
        assert_eq!(embed.title.as_deref(), Some("Custom"));
        assert_eq!(embed.color, Some(0x123456));
        // Defaults still applied for the rest.
        assert_eq!(embed.url.as_deref(), Some(SUPPORT_SERVER_URL));
    }
}
