//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch that transforms the schema.

use std::num::ParseIntError;

use rusqlite::{Connection, params};

use super::Error;

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. The version number is an
/// incrementing integer used to track which migrations have been applied.
/// All migrations are idempotent using CREATE IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[("1", include_str!("../../migrations/001_httpcache.sql"))];

/// Run any pending migrations.
///
/// This creates the _migrations table if it doesn't exist, checks the
/// current version, and applies any migrations that haven't been run yet,
/// all inside one transaction.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub fn run(conn: &mut Connection) -> Result<(), Error> {
    let tx = conn.transaction()?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: i64 = tx.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

    for (version, sql) in MIGRATIONS {
        let version_num: i64 =
            version.parse().map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
        if version_num > current {
            tx.execute_batch(sql).map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version_num, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(version = version_num, "applied migration");
        }
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();

        let has_table: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='httpcache')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_table);
    }

    #[test]
    fn test_migrations_version_tracking() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)).unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_seen_at_index_exists() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let has_index: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='index' AND name='httpcache_ix_seen_at')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_index);
    }

    #[test]
    fn test_primary_key_rejects_duplicate_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let insert = "INSERT INTO httpcache (fingerprint, namespace, status, url, headers, body)
                      VALUES (?1, ?2, 200, 'http://example.com', '{}', x'')";
        conn.execute(insert, params![b"fp".to_vec(), "spiderA"]).unwrap();
        conn.execute(insert, params![b"fp".to_vec(), "spiderB"]).unwrap();
        assert!(conn.execute(insert, params![b"fp".to_vec(), "spiderA"]).is_err());
    }

    #[test]
    fn test_seen_at_defaults_to_now() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO httpcache (fingerprint, namespace, status, url, headers, body)
             VALUES (x'01', 'ns', 200, 'http://example.com', '{}', x'')",
            [],
        )
        .unwrap();
        let seen_at: i64 = conn.query_row("SELECT seen_at FROM httpcache", [], |row| row.get(0)).unwrap();
        let now = chrono::Utc::now().timestamp_micros();
        assert!((now - seen_at).abs() < 60_000_000, "seen_at {seen_at} far from now {now}");
    }
}
