//! Store and notifier adapters

pub mod in_memory;
pub mod notifier;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use notifier::{FanoutNotifier, LogNotifier, MemoryNotifier, NatsNotifier};
pub use postgres::PgStore;
