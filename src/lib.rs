//! Attention bot — per-guild serialized command routing, bounded-retry
//! reminders, and structured audit logging.

pub mod audit;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod gate;
pub mod platform;
pub mod router;
pub mod scheduler;
pub mod store;
