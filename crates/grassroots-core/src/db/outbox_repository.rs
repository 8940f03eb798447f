//! Outbox repository implementation

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{
    DeliveryState, EventRecord, MarkOutcome, OutboxEntry, OutboxEntryId, RetentionPolicy,
};

/// SQLite binds integers as i64; larger counts saturate instead of wrapping.
fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

const SELECT_ENTRY: &str = "SELECT id, payload, delivery_state, created_at, delivered_at, attempts, last_error
     FROM outbox";

/// Trait for outbox storage operations
pub trait OutboxRepository {
    /// Persist a record as a new Pending entry
    fn insert(&self, record: &EventRecord, created_at: i64) -> Result<OutboxEntry>;

    /// Get an entry by id
    fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>>;

    /// All entries in insertion order
    fn list_all(&self) -> Result<Vec<OutboxEntry>>;

    /// The Pending entry with the lowest id
    fn oldest_pending(&self) -> Result<Option<OutboxEntry>>;

    /// Up to `limit` Pending entries, oldest first
    fn list_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    fn pending_count(&self) -> Result<usize>;

    /// Move an entry to Delivered. Never moves it back.
    fn mark_delivered(&self, id: OutboxEntryId, delivered_at: i64) -> Result<MarkOutcome>;

    /// Note a failed submission. Returns false when the entry no longer exists.
    fn record_failure(&self, id: OutboxEntryId, error: &str) -> Result<bool>;

    /// Delete Delivered entries the policy does not keep
    fn prune_delivered(&self, policy: RetentionPolicy, now: i64) -> Result<usize>;
}

/// `SQLite` implementation of `OutboxRepository`
pub struct SqliteOutboxRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutboxRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxEntry> {
        let payload: String = row.get(1)?;
        let payload: EventRecord = serde_json::from_str(&payload)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let state: String = row.get(2)?;
        let delivery_state: DeliveryState = state
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(OutboxEntry {
            id: OutboxEntryId::new(row.get(0)?),
            payload,
            delivery_state,
            created_at: row.get(3)?,
            delivered_at: row.get(4)?,
            attempts: row.get(5)?,
            last_error: row.get(6)?,
        })
    }

    fn query_entries(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<OutboxEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params, Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl OutboxRepository for SqliteOutboxRepository<'_> {
    fn insert(&self, record: &EventRecord, created_at: i64) -> Result<OutboxEntry> {
        let payload = serde_json::to_string(record)?;

        self.conn.execute(
            "INSERT INTO outbox (payload, natural_key, delivery_state, created_at) VALUES (?, ?, ?, ?)",
            params![
                payload,
                record.idempotency_key(),
                DeliveryState::Pending.as_str(),
                created_at
            ],
        )?;

        Ok(OutboxEntry {
            id: OutboxEntryId::new(self.conn.last_insert_rowid()),
            payload: record.clone(),
            delivery_state: DeliveryState::Pending,
            created_at,
            delivered_at: None,
            attempts: 0,
            last_error: None,
        })
    }

    fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_ENTRY} WHERE id = ?"),
                params![id.get()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn list_all(&self) -> Result<Vec<OutboxEntry>> {
        self.query_entries(&format!("{SELECT_ENTRY} ORDER BY id ASC"), [])
    }

    fn oldest_pending(&self) -> Result<Option<OutboxEntry>> {
        Ok(self.list_pending(1)?.into_iter().next())
    }

    fn list_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        self.query_entries(
            &format!("{SELECT_ENTRY} WHERE delivery_state = 'pending' ORDER BY id ASC LIMIT ?"),
            params![sql_count(limit)],
        )
    }

    fn pending_count(&self) -> Result<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE delivery_state = 'pending'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn mark_delivered(&self, id: OutboxEntryId, delivered_at: i64) -> Result<MarkOutcome> {
        let rows = self.conn.execute(
            "UPDATE outbox SET delivery_state = 'delivered', delivered_at = ?
             WHERE id = ? AND delivery_state = 'pending'",
            params![delivered_at, id.get()],
        )?;
        if rows > 0 {
            return Ok(MarkOutcome::Delivered);
        }

        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM outbox WHERE id = ?)",
            params![id.get()],
            |row| row.get(0),
        )?;
        Ok(if exists {
            MarkOutcome::AlreadyDelivered
        } else {
            MarkOutcome::NotFound
        })
    }

    fn record_failure(&self, id: OutboxEntryId, error: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE outbox SET attempts = attempts + 1, last_error = ?
             WHERE id = ? AND delivery_state = 'pending'",
            params![error, id.get()],
        )?;
        Ok(rows > 0)
    }

    fn prune_delivered(&self, policy: RetentionPolicy, now: i64) -> Result<usize> {
        let removed = match policy {
            RetentionPolicy::KeepAll => 0,
            RetentionPolicy::KeepLatest { count } => self.conn.execute(
                "DELETE FROM outbox
                 WHERE delivery_state = 'delivered'
                   AND id NOT IN (
                       SELECT id FROM outbox
                       WHERE delivery_state = 'delivered'
                       ORDER BY id DESC
                       LIMIT ?
                   )",
                params![sql_count(count)],
            )?,
            RetentionPolicy::OlderThan { .. } => {
                let max_age_ms = policy.max_age().map_or(i64::MAX, |age| {
                    i64::try_from(age.as_millis()).unwrap_or(i64::MAX)
                });
                self.conn.execute(
                    "DELETE FROM outbox
                     WHERE delivery_state = 'delivered'
                       AND COALESCE(delivered_at, created_at) < ?",
                    params![now.saturating_sub(max_age_ms)],
                )?
            }
        };
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EventKind, PlayerId, TeamId};
    use pretty_assertions::assert_eq;

    fn record(kind: EventKind, clock_ms: u64) -> EventRecord {
        EventRecord::new(
            kind,
            "1".into(),
            "2025".into(),
            1,
            clock_ms,
            TeamId::new("1"),
            PlayerId::anonymous(),
            None,
            None,
            None,
            1_750_000_000_000,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());

        let entry = repo.insert(&record(EventKind::Goal, 5_000), 100).unwrap();
        assert!(entry.is_pending());

        let loaded = repo.get(entry.id).unwrap().unwrap();
        assert_eq!(loaded, entry);
        assert!(repo.get(OutboxEntryId::new(999)).unwrap().is_none());
    }

    #[test]
    fn test_list_all_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());

        for clock_ms in [5_000, 3_000, 9_000] {
            repo.insert(&record(EventKind::Foul, clock_ms), 1).unwrap();
        }

        let clocks: Vec<u64> = repo
            .list_all()
            .unwrap()
            .iter()
            .map(|e| e.payload.clock_ms())
            .collect();
        assert_eq!(clocks, vec![5_000, 3_000, 9_000]);
    }

    #[test]
    fn test_mark_delivered_outcomes() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());
        let entry = repo.insert(&record(EventKind::Save, 1), 1).unwrap();

        assert_eq!(repo.mark_delivered(entry.id, 50).unwrap(), MarkOutcome::Delivered);
        assert_eq!(
            repo.mark_delivered(entry.id, 60).unwrap(),
            MarkOutcome::AlreadyDelivered
        );
        assert_eq!(
            repo.mark_delivered(OutboxEntryId::new(42), 60).unwrap(),
            MarkOutcome::NotFound
        );

        let stored = repo.get(entry.id).unwrap().unwrap();
        assert_eq!(stored.delivered_at, Some(50));
        assert_eq!(repo.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_record_failure_counts_attempts() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());
        let entry = repo.insert(&record(EventKind::Corner, 1), 1).unwrap();

        assert!(repo.record_failure(entry.id, "timeout").unwrap());
        assert!(repo.record_failure(entry.id, "HTTP 503").unwrap());

        let stored = repo.oldest_pending().unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("HTTP 503"));
        assert!(!repo.record_failure(OutboxEntryId::new(77), "gone").unwrap());
    }

    #[test]
    fn test_prune_keeps_pending_entries() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());

        let ids: Vec<_> = (0..4)
            .map(|i| repo.insert(&record(EventKind::BallWon, i), 1).unwrap().id)
            .collect();
        for id in &ids[..3] {
            repo.mark_delivered(*id, 1_000).unwrap();
        }

        assert_eq!(
            repo.prune_delivered(RetentionPolicy::KeepAll, 10_000).unwrap(),
            0
        );
        assert_eq!(
            repo.prune_delivered(RetentionPolicy::KeepLatest { count: 1 }, 10_000)
                .unwrap(),
            2
        );

        let remaining: Vec<_> = repo.list_all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![ids[2], ids[3]]);

        assert_eq!(
            repo.prune_delivered(RetentionPolicy::OlderThan { max_age_secs: 5 }, 10_000)
                .unwrap(),
            1
        );
        let remaining = repo.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_pending());
    }

    #[test]
    fn test_prune_with_huge_retention_keeps_delivered_history() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());
        let entry = repo.insert(&record(EventKind::Foul, 1), 1).unwrap();
        repo.mark_delivered(entry.id, 1_000).unwrap();

        assert_eq!(
            repo.prune_delivered(
                RetentionPolicy::OlderThan {
                    max_age_secs: u64::MAX
                },
                2_000
            )
            .unwrap(),
            0
        );
        assert_eq!(
            repo.prune_delivered(RetentionPolicy::KeepLatest { count: usize::MAX }, 2_000)
                .unwrap(),
            0
        );
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused_after_prune() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteOutboxRepository::new(db.connection());

        let first = repo.insert(&record(EventKind::Goal, 1), 1).unwrap();
        repo.mark_delivered(first.id, 2).unwrap();
        repo.prune_delivered(RetentionPolicy::KeepLatest { count: 0 }, 3)
            .unwrap();

        let second = repo.insert(&record(EventKind::Goal, 2), 4).unwrap();
        assert!(second.id > first.id);
    }
}
