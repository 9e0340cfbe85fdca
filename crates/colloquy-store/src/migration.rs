//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version is tracked in a `_migrations` table so migrations
//! are idempotent and only run once.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema — threads and their append-only turn log",
    sql: r#"
            CREATE TABLE threads (
                thread_key  TEXT PRIMARY KEY,
                title       TEXT,
                turn_count  INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE TABLE turns (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_key    TEXT NOT NULL REFERENCES threads(thread_key) ON DELETE CASCADE,
                seq           INTEGER NOT NULL,
                role          TEXT NOT NULL CHECK(role IN ('user','assistant','tool_result')),
                content       TEXT NOT NULL,
                tool_calls    TEXT,
                tool_call_id  TEXT,
                created_at    INTEGER NOT NULL,
                UNIQUE(thread_key, seq)
            );
            CREATE INDEX idx_turns_thread ON turns(thread_key);
        "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// This is a **synchronous** function — call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    info!(
        new_version = MIGRATIONS.last().map(|m| m.version).unwrap_or(0),
        "all migrations applied"
    );
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

/// Create the `_migrations` bookkeeping table if it does not exist.
fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // We cannot use `conn.transaction()` because that requires `&mut Connection`,
    // so we manage the transaction manually.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> StoreResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.version, migration.description, now],
        )
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to record migration: {e}"),
        })?;

        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
            info!(version = migration.version, "migration applied successfully");
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    /// The expected latest migration version (update when adding migrations).
    const LATEST_VERSION: u32 = 1;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[1].version > window[0].version,
                "migration versions must be strictly increasing: {} >= {}",
                window[0].version,
                window[1].version,
            );
        }
    }

    #[test]
    fn run_all_on_fresh_db() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, LATEST_VERSION);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, LATEST_VERSION);
    }

    #[test]
    fn migrations_create_all_tables() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
                )
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };

        assert!(tables.contains(&"threads".to_string()));
        assert!(tables.contains(&"turns".to_string()));
    }

    #[test]
    fn turns_role_check_constraint_enforced() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO threads (thread_key, turn_count, created_at, updated_at) \
             VALUES ('t1', 0, 0, 0)",
            [],
        )
        .unwrap();

        let ok = conn.execute(
            "INSERT INTO turns (thread_key, seq, role, content, created_at) \
             VALUES ('t1', 0, 'user', '\"hi\"', 0)",
            [],
        );
        assert!(ok.is_ok());

        let bad_role = conn.execute(
            "INSERT INTO turns (thread_key, seq, role, content, created_at) \
             VALUES ('t1', 1, 'narrator', '\"hi\"', 0)",
            [],
        );
        assert!(bad_role.is_err());

        // Duplicate sequence numbers within a thread are rejected.
        let dup_seq = conn.execute(
            "INSERT INTO turns (thread_key, seq, role, content, created_at) \
             VALUES ('t1', 0, 'assistant', '\"again\"', 0)",
            [],
        );
        assert!(dup_seq.is_err());
    }
}
