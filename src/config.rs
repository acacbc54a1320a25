//! Configuration types.

use std::time::Duration;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Default command prefix, used when a guild has no override.
    pub default_prefix: String,
    /// Quiescent period after a command completes, during which the guild
    /// may not start a new command.
    pub cooldown: Duration,
    /// Syntax-error count above which a user is banned.
    pub syntax_error_threshold: u32,
    /// Maximum retry count for a reminder job. A job with `retry_times`
    /// above this value is never attempted again.
    pub max_retry_times: u32,
    /// Interval between reminder scheduler ticks.
    pub tick_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_prefix: "ap!".to_string(),
            cooldown: Duration::from_millis(3000),
            syntax_error_threshold: 16,
            max_retry_times: 2,
            tick_interval: Duration::from_secs(20),
        }
    }
}
