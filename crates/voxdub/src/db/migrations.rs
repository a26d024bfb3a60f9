//! Versioned schema migrations.
//!
//! Every applied step leaves a row in `_migrations`. Column additions are
//! recorded without running when the column already exists.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Set for `ALTER TABLE .. ADD COLUMN` steps: `(table, column)`.
    adds_column: Option<(&'static str, &'static str)>,
}

impl Migration {
    fn needed(&self, conn: &Connection) -> Result<bool, DatabaseError> {
        match self.adds_column {
            Some((table, column)) => Ok(!column_exists(conn, table, column)?),
            None => Ok(true),
        }
    }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
        adds_column: None,
    },
    Migration {
        version: 2,
        name: "index_jobs_created_at",
        sql: include_str!("sql/002_index_jobs_created_at.sql"),
        adds_column: None,
    },
    Migration {
        version: 3,
        name: "add_extra_data_to_jobs",
        sql: include_str!("sql/003_add_extra_data.sql"),
        adds_column: Some(("jobs", "extra_data")),
    },
];

const BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Brings the schema up to the newest version. Each step commits on its
/// own, together with its `_migrations` row.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(BOOKKEEPING)?;
    let applied = schema_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration)?;
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if migration.needed(&tx)? {
        log::info!("Applying schema v{} ({})", migration.version, migration.name);
        tx.execute_batch(migration.sql).map_err(failed)?;
    } else {
        log::debug!(
            "Schema v{} already satisfied, recording only",
            migration.version
        );
    }
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    if table.is_empty() || !table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("refusing to inspect table '{}'", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    names.try_fold(false, |found, name| Ok(found || name? == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
        assert!(column_exists(&conn, "jobs", "extra_data").unwrap());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_add_column_skipped_when_present() {
        let conn = Connection::open_in_memory().unwrap();
        // A jobs table created by hand that already has extra_data.
        conn.execute_batch(
            "CREATE TABLE jobs (id TEXT PRIMARY KEY, filename TEXT, original_path TEXT,
             output_path TEXT, source_language TEXT, target_language TEXT, status TEXT,
             progress INTEGER, message TEXT, file_size INTEGER, duration REAL,
             created_at TEXT, completed_at TEXT, extra_data TEXT);",
        )
        .unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_column_exists_rejects_bad_identifier() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(column_exists(&conn, "jobs; DROP TABLE x", "id").is_err());
    }
}
