//! Schema definition and versioning

use rusqlite::Connection;

use crate::error::{Result, TmsuError};

/// Bumped whenever the schema below changes incompatibly.
pub const SCHEMA_REVISION: u32 = 1;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS file (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            directory TEXT NOT NULL,
            name TEXT NOT NULL,
            fingerprint TEXT NOT NULL DEFAULT '',
            mod_time INTEGER NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            CONSTRAINT con_file_path UNIQUE (directory, name)
        );

        CREATE INDEX IF NOT EXISTS idx_file_fingerprint ON file (fingerprint);

        CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS file_tag (
            file_id INTEGER NOT NULL REFERENCES file (id),
            tag_id INTEGER NOT NULL REFERENCES tag (id),
            PRIMARY KEY (file_id, tag_id)
        );

        CREATE INDEX IF NOT EXISTS idx_file_tag_tag ON file_tag (tag_id);

        CREATE TABLE IF NOT EXISTS implication (
            tag_id INTEGER NOT NULL REFERENCES tag (id),
            implied_tag_id INTEGER NOT NULL REFERENCES tag (id),
            PRIMARY KEY (tag_id, implied_tag_id)
        );

        CREATE TABLE IF NOT EXISTS implicit_file_tag (
            file_id INTEGER NOT NULL REFERENCES file (id),
            tag_id INTEGER NOT NULL REFERENCES tag (id),
            source_tag_id INTEGER NOT NULL REFERENCES tag (id),
            PRIMARY KEY (file_id, tag_id)
        );

        CREATE INDEX IF NOT EXISTS idx_implicit_file_tag_tag ON implicit_file_tag (tag_id);

        CREATE TABLE IF NOT EXISTS version (
            revision INTEGER NOT NULL
        );
    "#,
    )?;

    tracing::debug!("created schema tables");
    Ok(())
}

/// Record the current revision in a fresh database, or verify the one in
/// an existing database. Refuses to touch a database written by an
/// incompatible revision of the schema.
pub fn check_version(conn: &Connection) -> Result<()> {
    let recorded: Option<u32> =
        match conn.query_row("SELECT revision FROM version", [], |row| row.get(0)) {
            Ok(revision) => Some(revision),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

    match recorded {
        None => {
            conn.execute("INSERT INTO version (revision) VALUES (?1)", [SCHEMA_REVISION])?;
            Ok(())
        }
        Some(revision) if revision == SCHEMA_REVISION => Ok(()),
        Some(revision) => Err(TmsuError::IncompatibleSchema {
            found: revision,
            expected: SCHEMA_REVISION,
        }),
    }
}
