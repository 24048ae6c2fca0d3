//! Storage module - SQLite database and typed table access
//!
//! Owns the database connection, the schema and the transaction bracket.
//! Submodules expose typed operations per table; all of them run inside a
//! `Transaction`, which rolls back on drop unless committed.

pub mod file;
pub mod filetag;
pub mod implication;
mod schema;
pub mod tag;

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::{Result, TmsuError};

pub struct Store {
    pub db_path: PathBuf,
    conn: Connection,
}

impl Store {
    /// Create a fresh database at `db_path`, creating the parent directory.
    /// Refuses to clobber an existing database.
    pub fn create_at(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            return Err(TmsuError::AlreadyExists(format!(
                "database already exists at '{}'",
                db_path.display()
            )));
        }

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!("creating database at {}", db_path.display());
        Self::create_or_open(db_path)?;
        Ok(())
    }

    /// Open the database at `db_path`, refusing if it does not exist.
    pub fn open(db_path: &Path) -> Result<Store> {
        if !db_path.is_file() {
            return Err(TmsuError::NotFound(format!(
                "no database found at '{}' (run 'init' first)",
                db_path.display()
            )));
        }

        tracing::debug!("opening database at {}", db_path.display());
        Self::create_or_open(db_path)
    }

    fn create_or_open(db_path: &Path) -> Result<Store> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn, db_path.to_path_buf())
    }

    /// A transient in-memory store, mainly for tests.
    pub fn open_in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Store> {
        // WAL keeps readers unblocked while a writer commits
        conn.pragma_update(None, "journal_mode", WAL)?;
        conn.pragma_update(None, "foreign_keys", ON)?;
        conn.pragma_update(None, "synchronous", NORMAL)?;

        schema::create_tables(&conn)?;
        schema::check_version(&conn)?;

        Ok(Store { db_path, conn })
    }

    /// Begin the single transaction bracketing a command execution.
    /// Dropping the transaction without `commit` rolls everything back.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        Ok(Transaction {
            tx: self.conn.transaction()?,
        })
    }
}

pub struct Transaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

// The helper methods hide rusqlite-specific plumbing from the table
// submodules; only query parameters and row getters leak through.
impl<'a> Transaction<'a> {
    pub fn commit(self) -> Result<()> {
        Ok(self.tx.commit()?)
    }

    pub(crate) fn execute<P: rusqlite::Params>(&mut self, sql: &str, params: P) -> Result<usize> {
        Ok(self.tx.execute(sql, params)?)
    }

    /// Run a query and map every row through `f`.
    pub(crate) fn query_vec<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: rusqlite::Params,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.tx.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;

        let mut objects = Vec::new();
        for row in rows {
            objects.push(row?);
        }
        Ok(objects)
    }

    /// Run a query expected to return at most one row.
    pub(crate) fn query_single<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: rusqlite::Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.tx.prepare(sql)?;
        match stmt.query_row(params, f) {
            Ok(object) => Ok(Some(object)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn count_from_table(&mut self, table_name: &str) -> Result<u64> {
        let sql = format!("SELECT count(*) FROM {}", table_name);
        let count: i64 = self.tx.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub(crate) fn last_insert_row_id(&self) -> i64 {
        self.tx.last_insert_rowid()
    }
}

/// Generate a "?,?,?" placeholder list with one entry per value.
pub(crate) fn generate_placeholders(count: usize) -> String {
    let placeholders: Vec<&str> = std::iter::repeat("?").take(count).collect();
    placeholders.join(",")
}

// SQL pragma constants
const WAL: &str = "WAL";
const ON: &str = "ON";
const NORMAL: &str = "NORMAL";
