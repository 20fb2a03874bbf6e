//! SQLite ledger backend.
//!
//! One connection behind a mutex; every call hops onto the blocking pool.
//! Chain state is stored as canonical CBOR next to a per-address balance
//! table that is kept in step on each commit.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use fatd_core::{Address, ChainId, ChainState, EntryHash, Transaction};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{LedgerStore, WriteSet};

/// Durable [`LedgerStore`]. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating missing parent
    /// directories, and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")?;
        Self::from_connection(conn)
    }

    /// A private in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection mutex poisoned".into()))?;
            f(&mut guard)
        })
        .await;
        joined.map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn bytes32(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{} is not 32 bytes", column)))
}

fn decode_amount(bytes: Vec<u8>) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData("balance is not 8 bytes".into()))?;
    Ok(u64::from_be_bytes(arr))
}

fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(tx, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_transaction(bytes: &[u8]) -> Result<Transaction> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_transactions(rows: Vec<Vec<u8>>) -> Result<Vec<Transaction>> {
    rows.iter().map(|body| decode_transaction(body)).collect()
}

/// SQLite integers are signed; heights past `i64::MAX` cannot be stored.
fn height_to_sql(height: u64) -> Result<i64> {
    i64::try_from(height).map_err(|_| {
        StoreError::InvalidData(format!("height {height} exceeds sqlite integer range"))
    })
}

fn height_from_sql(height: i64) -> Result<u64> {
    u64::try_from(height)
        .map_err(|_| StoreError::InvalidData(format!("negative height {height} in store")))
}

fn write_set(conn: &mut Connection, writes: &WriteSet) -> Result<()> {
    let chain = writes.chain_id.as_bytes().as_slice();
    let now = now_millis();
    let tx = conn.transaction()?;

    // 1. Cursor must not move backwards
    let cursor = writes.cursor.map(height_to_sql).transpose()?;
    if let Some(height) = writes.cursor {
        let current: Option<i64> = tx
            .query_row(
                "SELECT height FROM cursors WHERE chain_id = ?1",
                params![chain],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(current) = current.map(height_from_sql).transpose()? {
            if height < current {
                return Err(StoreError::CursorRegression {
                    chain_id: writes.chain_id,
                    current,
                    proposed: height,
                });
            }
        }
    }

    // 2. Transaction history
    for record in &writes.transactions {
        let hash = record.entry_hash.as_bytes().as_slice();
        let exists = tx
            .query_row(
                "SELECT 1 FROM transactions WHERE chain_id = ?1 AND entry_hash = ?2",
                params![chain, hash],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(StoreError::DuplicateTransaction {
                chain_id: writes.chain_id,
                entry_hash: record.entry_hash,
            });
        }

        tx.execute(
            "INSERT INTO transactions (chain_id, entry_hash, height, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                chain,
                hash,
                height_to_sql(record.height)?,
                encode_transaction(record)?
            ],
        )?;
        for address in record.addresses() {
            tx.execute(
                "INSERT OR IGNORE INTO transaction_addresses (chain_id, address, entry_hash)
                 VALUES (?1, ?2, ?3)",
                params![chain, address.as_bytes().as_slice(), hash],
            )?;
        }
    }

    // 3. Chain state and the balance index
    if let Some(state) = &writes.state {
        tx.execute(
            "INSERT INTO chains (chain_id, state, state_hash, active, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(chain_id) DO UPDATE SET
                state = excluded.state,
                state_hash = excluded.state_hash,
                active = excluded.active,
                updated_at = excluded.updated_at",
            params![
                chain,
                state.canonical_bytes()?,
                state.state_hash()?.as_bytes().as_slice(),
                state.issuance.is_some(),
                now,
            ],
        )?;

        // Balances only change through transactions.
        let touched: BTreeSet<Address> = writes
            .transactions
            .iter()
            .flat_map(|record| record.addresses())
            .collect();
        for address in touched {
            let amount = state.balance(&address);
            if amount == 0 {
                tx.execute(
                    "DELETE FROM balances WHERE chain_id = ?1 AND address = ?2",
                    params![chain, address.as_bytes().as_slice()],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO balances (chain_id, address, amount) VALUES (?1, ?2, ?3)
                     ON CONFLICT(chain_id, address) DO UPDATE SET amount = excluded.amount",
                    params![
                        chain,
                        address.as_bytes().as_slice(),
                        amount.to_be_bytes().as_slice()
                    ],
                )?;
            }
        }
    }

    // 4. Cursor
    if let Some(height) = cursor {
        tx.execute(
            "INSERT INTO cursors (chain_id, height, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(chain_id) DO UPDATE SET
                height = excluded.height,
                updated_at = excluded.updated_at",
            params![chain, height, now],
        )?;
    }

    tx.commit()?;
    Ok(())
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn get_chain_state(&self, chain_id: &ChainId) -> Result<Option<ChainState>> {
        let chain_id = *chain_id;

        self.with_conn(move |conn| {
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT state FROM chains WHERE chain_id = ?1",
                    params![chain_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            blob.map(|b| ChainState::from_canonical_bytes(&b).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn get_balance(&self, chain_id: &ChainId, address: &Address) -> Result<u64> {
        let chain_id = *chain_id;
        let address = *address;

        self.with_conn(move |conn| {
            let amount: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT amount FROM balances WHERE chain_id = ?1 AND address = ?2",
                    params![
                        chain_id.as_bytes().as_slice(),
                        address.as_bytes().as_slice()
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            amount.map(decode_amount).transpose().map(|a| a.unwrap_or(0))
        })
        .await
    }

    async fn list_chains(&self) -> Result<Vec<ChainId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT chain_id FROM chains ORDER BY chain_id")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|b| bytes32(b, "chain_id").map(ChainId::from_bytes))
                .collect()
        })
        .await
    }

    async fn get_cursor(&self, chain_id: &ChainId) -> Result<Option<u64>> {
        let chain_id = *chain_id;

        self.with_conn(move |conn| {
            let height: Option<i64> = conn
                .query_row(
                    "SELECT height FROM cursors WHERE chain_id = ?1",
                    params![chain_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            height.map(height_from_sql).transpose()
        })
        .await
    }

    async fn get_sync_height(&self) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            let height: Option<i64> =
                conn.query_row("SELECT MIN(height) FROM cursors", [], |row| row.get(0))?;
            height.map(height_from_sql).transpose()
        })
        .await
    }

    async fn has_transaction(&self, chain_id: &ChainId, entry_hash: &EntryHash) -> Result<bool> {
        let chain_id = *chain_id;
        let entry_hash = *entry_hash;

        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM transactions WHERE chain_id = ?1 AND entry_hash = ?2",
                    params![
                        chain_id.as_bytes().as_slice(),
                        entry_hash.as_bytes().as_slice()
                    ],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn get_transaction(
        &self,
        chain_id: &ChainId,
        entry_hash: &EntryHash,
    ) -> Result<Option<Transaction>> {
        let chain_id = *chain_id;
        let entry_hash = *entry_hash;

        self.with_conn(move |conn| {
            let body: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT body FROM transactions WHERE chain_id = ?1 AND entry_hash = ?2",
                    params![
                        chain_id.as_bytes().as_slice(),
                        entry_hash.as_bytes().as_slice()
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| decode_transaction(&b)).transpose()
        })
        .await
    }

    async fn list_transactions(
        &self,
        chain_id: &ChainId,
        address: Option<&Address>,
    ) -> Result<Vec<Transaction>> {
        let chain_id = *chain_id;
        let address = address.copied();

        self.with_conn(move |conn| {
            let rows = match address {
                Some(address) => {
                    let mut stmt = conn.prepare(
                        "SELECT t.body FROM transactions t
                         JOIN transaction_addresses a
                           ON a.chain_id = t.chain_id AND a.entry_hash = t.entry_hash
                         WHERE t.chain_id = ?1 AND a.address = ?2
                         ORDER BY t.rowid",
                    )?;
                    let rows = stmt
                        .query_map(
                            params![
                                chain_id.as_bytes().as_slice(),
                                address.as_bytes().as_slice()
                            ],
                            |row| row.get::<_, Vec<u8>>(0),
                        )?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT body FROM transactions WHERE chain_id = ?1 ORDER BY rowid",
                    )?;
                    let rows = stmt
                        .query_map(params![chain_id.as_bytes().as_slice()], |row| {
                            row.get::<_, Vec<u8>>(0)
                        })?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            decode_transactions(rows)
        })
        .await
    }

    async fn commit_writes(&self, writes: WriteSet) -> Result<()> {
        let chain_id = writes.chain_id;
        let cursor = writes.cursor;
        let count = writes.transactions.len();

        self.with_conn(move |conn| write_set(conn, &writes)).await?;

        tracing::trace!(chain = %chain_id, ?cursor, transactions = count, "committed write set");
        Ok(())
    }
}
