//! `help` command — static usage text with the guild's prefix.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::SharedCache;
use crate::commands::{Command, CommandResult, Invocation};
use crate::error::CommandError;
use crate::platform::escape_markdown;

/// User manual link shown by the help text.
pub const MANUAL_URL: &str = "https://github.com/attention-bot/attention-bot#readme";

/// Support server invitation shown by the help text.
pub const SUPPORT_SERVER_URL: &str = "https://discord.gg/attention-bot";

pub struct HelpCommand {
    cache: Arc<SharedCache>,
    default_prefix: String,
}

impl HelpCommand {
    pub fn new(cache: Arc<SharedCache>, default_prefix: impl Into<String>) -> Self {
        Self {
            cache,
            default_prefix: default_prefix.into(),
        }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn execute(&self, invocation: &Invocation) -> Result<CommandResult, CommandError> {
        let prefix = self
            .cache
            .prefix_for(&invocation.guild_id, &self.default_prefix)
            .await;
        Ok(CommandResult::text(format!(
            ":pushpin: Attention Please\nCommand prefix: `{}`\nManual: <{}>\nSupport server: {}",
            escape_markdown(&prefix),
            MANUAL_URL,
            SUPPORT_SERVER_URL,
        )))
    }
}
