//! Data models for Grassroots

mod event;
mod outbox;
mod team;

pub use event::{EventCategory, EventKind, EventRecord, NaturalKey, Sentiment};
pub use outbox::{DeliveryState, MarkOutcome, OutboxEntry, OutboxEntryId, RetentionPolicy};
pub use team::{Fixture, Player, PlayerId, Team, TeamId};
