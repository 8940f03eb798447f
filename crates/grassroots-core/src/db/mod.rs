//! Database layer for the capture outbox

mod connection;
mod migrations;
mod outbox_repository;

pub use connection::Database;
pub use outbox_repository::{OutboxRepository, SqliteOutboxRepository};
