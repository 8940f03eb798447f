//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Apply `statements` atomically, rolling back on the first failure.
fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    for stmt in statements {
        if let Err(e) = conn.execute_batch(stmt) {
            conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute_batch("COMMIT") {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }
    Ok(())
}

/// Migration to version 1: outbox table
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // AUTOINCREMENT: ids are never reused, even after pruning
            "CREATE TABLE IF NOT EXISTS outbox (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                natural_key TEXT NOT NULL,
                delivery_state TEXT NOT NULL DEFAULT 'pending'
                    CHECK (delivery_state IN ('pending', 'delivered')),
                created_at INTEGER NOT NULL,
                delivered_at INTEGER,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_outbox_state ON outbox(delivery_state, id)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: delivery-state and payload guards
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TRIGGER IF NOT EXISTS outbox_state_forward_only BEFORE UPDATE OF delivery_state ON outbox
             FOR EACH ROW
             WHEN OLD.delivery_state = 'delivered' AND NEW.delivery_state <> 'delivered'
             BEGIN
                 SELECT RAISE(ABORT, 'delivered outbox entries cannot return to pending');
             END",
            "CREATE TRIGGER IF NOT EXISTS outbox_payload_immutable BEFORE UPDATE OF payload, natural_key, created_at ON outbox
             FOR EACH ROW
             WHEN NEW.payload IS NOT OLD.payload
                 OR NEW.natural_key IS NOT OLD.natural_key
                 OR NEW.created_at IS NOT OLD.created_at
             BEGIN
                 SELECT RAISE(ABORT, 'outbox payloads are immutable');
             END",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn insert_pending(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO outbox (payload, natural_key, created_at) VALUES ('{}', 'k', 1)",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_trigger_rejects_backward_transition() {
        let conn = setup();
        run(&conn).unwrap();
        let id = insert_pending(&conn);

        conn.execute(
            "UPDATE outbox SET delivery_state = 'delivered' WHERE id = ?",
            [id],
        )
        .unwrap();
        let err = conn
            .execute(
                "UPDATE outbox SET delivery_state = 'pending' WHERE id = ?",
                [id],
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot return to pending"));
    }

    #[test]
    fn test_trigger_rejects_payload_update() {
        let conn = setup();
        run(&conn).unwrap();
        let id = insert_pending(&conn);

        let err = conn
            .execute(
                "UPDATE outbox SET payload = '{\"kind\":\"foul\"}' WHERE id = ?",
                [id],
            )
            .unwrap_err();
        assert!(err.to_string().contains("immutable"));
    }

    #[test]
    fn test_check_constraint_rejects_unknown_state() {
        let conn = setup();
        run(&conn).unwrap();
        let id = insert_pending(&conn);

        assert!(conn
            .execute(
                "UPDATE outbox SET delivery_state = 'lost' WHERE id = ?",
                [id],
            )
            .is_err());
    }
}
