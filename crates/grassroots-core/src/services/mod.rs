//! Shared services used by every capture surface.

mod outbox;

pub use outbox::Outbox;
