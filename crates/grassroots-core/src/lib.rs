//! grassroots-core - Core library for Grassroots
//!
//! Offline match event capture: a drift-resistant match clock, immutable
//! event records, a durable `SQLite` outbox and the background worker that
//! delivers it to the ingestion endpoint.

pub mod builder;
pub mod clock;
pub mod config;
pub mod db;
pub mod delivery;
pub mod dictation;
pub mod error;
pub mod goal_flow;
pub mod models;
pub mod services;
pub mod state;
pub mod util;

pub use builder::{EventIntent, EventRecordBuilder};
pub use clock::MatchClock;
pub use error::{Error, Result};
pub use models::{EventKind, EventRecord, OutboxEntry, OutboxEntryId};
pub use services::Outbox;
