//! Schema versioning for the SQLite backend.
//!
//! The version lives in `PRAGMA user_version`. `MIGRATIONS[n]` takes the
//! schema from version `n` to `n + 1`, and every pending step runs inside one
//! transaction together with the version bump.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

const MIGRATIONS: &[&str] = &[V1_LEDGER];

/// Version a fully migrated database reports.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

const V1_LEDGER: &str = r#"
    -- chain state as canonical CBOR; active = 1 once issuance is accepted
    CREATE TABLE chains (
        chain_id   BLOB PRIMARY KEY,
        state      BLOB NOT NULL,
        state_hash BLOB NOT NULL,
        active     INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    -- nonzero balances only; amount is a big endian u64
    CREATE TABLE balances (
        chain_id BLOB NOT NULL,
        address  BLOB NOT NULL,
        amount   BLOB NOT NULL,
        PRIMARY KEY (chain_id, address)
    );

    -- last fully processed block height per chain
    CREATE TABLE cursors (
        chain_id   BLOB PRIMARY KEY,
        height     INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    -- seq preserves acceptance order
    CREATE TABLE transactions (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        chain_id   BLOB NOT NULL,
        entry_hash BLOB NOT NULL,
        height     INTEGER NOT NULL,
        body       BLOB NOT NULL,
        UNIQUE (chain_id, entry_hash)
    );

    CREATE TABLE transaction_addresses (
        chain_id   BLOB NOT NULL,
        address    BLOB NOT NULL,
        entry_hash BLOB NOT NULL,
        PRIMARY KEY (chain_id, address, entry_hash)
    );

    CREATE INDEX idx_cursors_height ON cursors(height);
"#;

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` to [`CURRENT_VERSION`]. A no-op on an up to date database.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database is at schema {found}, this build understands up to {CURRENT_VERSION}"
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(sql)?;
        tracing::debug!(version = index + 1, "applied schema migration");
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;
    Ok(())
}

/// Unix milliseconds, zero if the clock is before 1970.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let names = stmt.query_map([], |row| row.get(0)).unwrap();
        names.collect::<rusqlite::Result<_>>().unwrap()
    }

    #[test]
    fn test_fresh_database_gets_ledger_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(
            tables(&conn),
            ["balances", "chains", "cursors", "transaction_addresses", "transactions"]
        );
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_second_migrate_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO cursors (chain_id, height, updated_at) VALUES (x'01', 5, 0)",
            [],
        )
        .unwrap();
        migrate(&mut conn).unwrap();
        let height: i64 = conn
            .query_row("SELECT height FROM cursors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(height, 5);
    }

    #[test]
    fn test_future_schema_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1).unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
