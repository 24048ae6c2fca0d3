//! File table operations

use rusqlite::params;

use crate::entities::{File, FileId};
use crate::error::{Result, TmsuError};
use crate::storage::{generate_placeholders, Transaction};

fn parse_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: row.get(0)?,
        dir: row.get(1)?,
        name: row.get(2)?,
        fingerprint: row.get(3)?,
        mod_time: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
    })
}

const FILE_COLUMNS: &str = "id, directory, name, fingerprint, mod_time, size";

pub fn file_count(tx: &mut Transaction) -> Result<u64> {
    tx.count_from_table("file")
}

pub fn file_by_path(tx: &mut Transaction, dir: &str, name: &str) -> Result<Option<File>> {
    let sql = "
SELECT id, directory, name, fingerprint, mod_time, size
FROM file
WHERE directory = ?1 AND name = ?2";

    tx.query_single(sql, params![dir, name], parse_file)
}

pub fn file_by_id(tx: &mut Transaction, file_id: FileId) -> Result<Option<File>> {
    let sql = "
SELECT id, directory, name, fingerprint, mod_time, size
FROM file
WHERE id = ?1";

    tx.query_single(sql, params![file_id], parse_file)
}

pub fn all_files(tx: &mut Transaction) -> Result<Vec<File>> {
    let sql = "
SELECT id, directory, name, fingerprint, mod_time, size
FROM file
ORDER BY directory, name";

    tx.query_vec(sql, [], parse_file)
}

pub fn files_by_ids(tx: &mut Transaction, file_ids: &[FileId]) -> Result<Vec<File>> {
    if file_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "
SELECT {}
FROM file
WHERE id IN ({})
ORDER BY directory, name",
        FILE_COLUMNS,
        generate_placeholders(file_ids.len())
    );

    tx.query_vec(&sql, rusqlite::params_from_iter(file_ids), parse_file)
}

/// Files stored in `dir` itself or anywhere beneath it.
pub fn files_under(tx: &mut Transaction, dir: &str) -> Result<Vec<File>> {
    let sql = "
SELECT id, directory, name, fingerprint, mod_time, size
FROM file
WHERE directory = ?1 OR directory LIKE ?2
ORDER BY directory, name";

    let prefix = if dir == "/" {
        "/%".to_string()
    } else {
        format!("{}/%", dir)
    };
    tx.query_vec(sql, params![dir, prefix], parse_file)
}

pub fn files_by_fingerprint(tx: &mut Transaction, fingerprint: &str) -> Result<Vec<File>> {
    let sql = "
SELECT id, directory, name, fingerprint, mod_time, size
FROM file
WHERE fingerprint = ?1
ORDER BY id";

    tx.query_vec(sql, params![fingerprint], parse_file)
}

/// The distinct directories currently recorded in the index.
pub fn directories(tx: &mut Transaction) -> Result<Vec<String>> {
    let sql = "SELECT DISTINCT directory FROM file ORDER BY directory";
    tx.query_vec(sql, [], |row| row.get(0))
}

pub fn insert_file(
    tx: &mut Transaction,
    dir: &str,
    name: &str,
    fingerprint: &str,
    mod_time: i64,
    size: u64,
) -> Result<File> {
    let sql = "
INSERT INTO file (directory, name, fingerprint, mod_time, size)
VALUES (?1, ?2, ?3, ?4, ?5)";

    tx.execute(sql, params![dir, name, fingerprint, mod_time, size as i64])?;

    Ok(File {
        id: FileId(tx.last_insert_row_id()),
        dir: dir.to_string(),
        name: name.to_string(),
        fingerprint: fingerprint.to_string(),
        mod_time,
        size,
    })
}

/// Rewrite a file row in place, e.g. after a repair move or modification.
pub fn update_file(
    tx: &mut Transaction,
    file_id: FileId,
    dir: &str,
    name: &str,
    fingerprint: &str,
    mod_time: i64,
    size: u64,
) -> Result<()> {
    let sql = "
UPDATE file
SET directory = ?1, name = ?2, fingerprint = ?3, mod_time = ?4, size = ?5
WHERE id = ?6";

    match tx.execute(sql, params![dir, name, fingerprint, mod_time, size as i64, file_id])? {
        1 => Ok(()),
        _ => Err(TmsuError::NotFound(format!("no such file #{}", file_id))),
    }
}

pub fn delete_file(tx: &mut Transaction, file_id: FileId) -> Result<()> {
    let sql = "DELETE FROM file WHERE id = ?1";

    match tx.execute(sql, params![file_id])? {
        1 => Ok(()),
        _ => Err(TmsuError::NotFound(format!("no such file #{}", file_id))),
    }
}

/// Delete the given files where no explicit tagging remains.
pub fn delete_untagged_files(tx: &mut Transaction, file_ids: &[FileId]) -> Result<usize> {
    let sql = "
DELETE FROM file
WHERE id = ?1
AND (SELECT count(1) FROM file_tag WHERE file_id = ?1) = 0";

    let mut deleted = 0;
    for file_id in file_ids {
        deleted += tx.execute(sql, params![file_id])?;
    }
    Ok(deleted)
}
