//! # reverie-memory
//!
//! Persistent bot memory for Reverie (a single JSON document).

pub mod store;

pub use store::{parse_date, BotMemory, Period, PeriodicSummary, Store, StoredMessage};
