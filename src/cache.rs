//! Process-wide read-mostly snapshot of tenant settings and policy state.
//!
//! The persistent store is authoritative; this cache is a best-effort mirror
//! hydrated at startup and updated alongside store writes. Stale reads are
//! tolerated.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;

use crate::store::{GuildSettings, JobStore};

/// Shared settings/ban/syntax-error cache.
#[derive(Default)]
pub struct SharedCache {
    settings: RwLock<HashMap<String, GuildSettings>>,
    banned: RwLock<HashMap<String, String>>,
    syntax_errors: RwLock<HashMap<String, u32>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings and bans from the store. Syntax-error counters are not
    /// persisted; they start at zero each process lifetime.
    pub async fn hydrate(&self, store: &dyn JobStore) -> crate::error::Result<()> {
        let settings = store.all_settings().await?;
        let bans = store.bans().await?;
        info!(
            guilds = settings.len(),
            bans = bans.len(),
            "Cache hydrated from store"
        );
        *self.settings.write().await = settings;
        *self.banned.write().await = bans;
        Ok(())
    }

    /// The command prefix for a guild, falling back to `default`.
    pub async fn prefix_for(&self, guild_id: &str, default: &str) -> String {
        self.settings
            .read()
            .await
            .get(guild_id)
            .and_then(|s| s.prefix.clone())
            .unwrap_or_else(|| default.to_string())
    }

    /// Whether a user or guild id has a ban record.
    pub async fn is_banned(&self, id: &str) -> bool {
        self.banned.read().await.contains_key(id)
    }

    /// Mirror a ban written to the store.
    pub async fn set_ban(&self, id: impl Into<String>, reason: impl Into<String>) {
        self.banned.write().await.insert(id.into(), reason.into());
    }

    /// Increment a user's syntax-error counter and return the new count.
    /// Counters only ever grow.
    pub async fn record_syntax_error(&self, user_id: &str) -> u32 {
        let mut counters = self.syntax_errors.write().await;
        let count = counters.entry(user_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Current syntax-error count for a user.
    pub async fn syntax_error_count(&self, user_id: &str) -> u32 {
        self.syntax_errors
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }
}
