//! Schema history for the quote database.
//!
//! The database holds a single key-value table:
//!
//! ```text
//! kv_entries(key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at INTEGER)
//! ```
//!
//! `quotes` stores the whole collection as one JSON array and `lastFilter`
//! the saved category filter. Every write replaces the row for its key.
//!
//! # Invariants
//! - Step versions are strictly increasing; the newest one is mirrored to
//!   `PRAGMA user_version`.
//! - Pending steps apply in one transaction or not at all.
//! - A database stamped newer than this binary is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "kv_entries",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the newest schema version this binary can read.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the quote database up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stamped = stamped_version(conn)?;
    let latest = latest_version();

    if stamped > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stamped,
            latest_supported: latest,
        });
    }

    let pending = pending_steps(stamped);
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={stamped} to_version={latest}");
    Ok(())
}

fn pending_steps(stamped: u32) -> &'static [SchemaStep] {
    let first_pending = SCHEMA_STEPS.partition_point(|step| step.version <= stamped);
    &SCHEMA_STEPS[first_pending..]
}

fn stamped_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, pending_steps, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_are_strictly_increasing() {
        assert!(SCHEMA_STEPS
            .windows(2)
            .all(|pair| pair[0].version < pair[1].version));
        assert_eq!(latest_version(), 1);
    }

    #[test]
    fn pending_steps_start_after_stamped_version() {
        assert_eq!(pending_steps(0).len(), SCHEMA_STEPS.len());
        assert!(pending_steps(latest_version()).is_empty());
    }

    #[test]
    fn kv_entries_upsert_replaces_value_for_key() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();

        for value in ["[]", r#"[{"text":"a","category":"b"}]"#] {
            conn.execute(
                "INSERT INTO kv_entries (key, value) VALUES ('quotes', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                [value],
            )
            .unwrap();
        }

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_entries;", [], |row| row.get(0))
            .unwrap();
        let updated_at: i64 = conn
            .query_row(
                "SELECT updated_at FROM kv_entries WHERE key = 'quotes';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
        assert!(updated_at > 0);
    }
}
