//! Persistent key-value store, addressed by hierarchical paths.

pub mod firebase;
pub mod memory;
pub mod traits;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use traits::{GuildSettings, JobStore, RemindJob};
