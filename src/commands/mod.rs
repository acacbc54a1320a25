//! Command registry and handler seam.
//!
//! Handlers are registered statically at startup; there is no runtime
//! discovery. The router resolves a name to a handler, drives it through the
//! guild gate, and reports the outcome.

pub mod help;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CommandError;
use crate::platform::Embed;

pub use help::HelpCommand;

/// Name of the command invoked by a bare mention of the bot.
pub const HELP_COMMAND: &str = "help";

/// One inbound command call, owned by a single router invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub message_id: String,
    /// Raw message content.
    pub content: String,
    /// Whitespace-collapsed tokens, command token included.
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Value returned by a handler.
///
/// A result with neither content nor embed is itself treated as a failure by
/// the router.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    /// Marks malformed user input; drives syntax-error escalation.
    pub syntax_error: bool,
    /// Underlying error, attached to the audit record.
    pub error: Option<String>,
}

impl CommandResult {
    /// Plain-text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Plain-text result flagged as a syntax error.
    pub fn syntax_error(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            syntax_error: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.embed.is_none()
    }
}

/// An async command handler.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, invocation: &Invocation) -> Result<CommandResult, CommandError>;
}

/// Static name-to-handler table, built once at initialization.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        self.commands.insert(name, command);
        tracing::debug!("Registered command: {}", name);
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
