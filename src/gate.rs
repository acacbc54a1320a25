//! Per-guild concurrency gate.
//!
//! Guarantees at most one command executes per guild at a time. A guild with
//! no entry in the map is idle; `try_enter` moves it to `Processing`,
//! `finish` moves it to `CoolingDown` and schedules the entry's removal
//! after the cooldown delay. A second arrival while busy mutes the guild so
//! the "please wait" notice is sent only once per busy window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Activity state of a guild. Idle guilds have no entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildActivity {
    /// A command is executing.
    Processing,
    /// The last command finished; new commands are rejected until the
    /// cooldown timer clears the entry.
    CoolingDown,
    /// A rejection notice has already been sent this busy window.
    Muted,
}

/// Why an admission request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A command is still processing. The caller should notify once.
    Busy,
    /// The guild is cooling down. The caller should notify once.
    CoolingDown,
    /// The guild was already notified this busy window. Stay silent.
    Muted,
}

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(RejectReason),
}

/// The per-guild admission gate.
///
/// Pure state transitions over an in-memory map; this component never fails.
/// State is lost on restart, which simply makes every guild eligible again.
pub struct GuildGate {
    cooldown: Duration,
    guilds: Arc<Mutex<HashMap<String, GuildActivity>>>,
}

impl GuildGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            guilds: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request admission for a guild.
    ///
    /// Rejections during `Processing` or `CoolingDown` transition the guild
    /// to `Muted` so that only the first rejection produces a notice.
    pub fn try_enter(&self, guild_id: &str) -> Admission {
        let mut guilds = self.guilds.lock().unwrap_or_else(|e| e.into_inner());
        match guilds.get(guild_id).copied() {
            None => {
                guilds.insert(guild_id.to_string(), GuildActivity::Processing);
                Admission::Admitted
            }
            Some(GuildActivity::Processing) => {
                guilds.insert(guild_id.to_string(), GuildActivity::Muted);
                Admission::Rejected(RejectReason::Busy)
            }
            Some(GuildActivity::CoolingDown) => {
                guilds.insert(guild_id.to_string(), GuildActivity::Muted);
                Admission::Rejected(RejectReason::CoolingDown)
            }
            Some(GuildActivity::Muted) => Admission::Rejected(RejectReason::Muted),
        }
    }

    /// Mark a guild's command as finished, success or failure.
    ///
    /// Always moves the guild to `CoolingDown` and spawns a one-shot timer
    /// that clears the entry after the cooldown delay. The timer is never
    /// cancelled; it fires unconditionally and removing an already-absent
    /// entry is a no-op.
    pub fn finish(&self, guild_id: &str) {
        let mut guilds = self.guilds.lock().unwrap_or_else(|e| e.into_inner());
        guilds.insert(guild_id.to_string(), GuildActivity::CoolingDown);
        drop(guilds);

        let guilds = Arc::clone(&self.guilds);
        let guild_id = guild_id.to_string();
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            guilds
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&guild_id);
        });
    }

    /// Current activity of a guild, `None` when idle.
    pub fn current(&self, guild_id: &str) -> Option<GuildActivity> {
        self.guilds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(guild_id)
            .copied()
    }
}
