//! Explicit and implicit tagging operations
//!
//! The `file_tag` table records the user's explicit taggings. The
//! `implicit_file_tag` table is fully derived: it holds the materialised
//! implication closure minus the explicit set, and is only ever written
//! through `replace_implicit_for_file`.

use rusqlite::params;

use crate::entities::{FileId, FileTag, ImplicitFileTag, Tag, TagId};
use crate::error::{Result, TmsuError};
use crate::storage::{generate_placeholders, Transaction};

pub fn file_tag_count(tx: &mut Transaction) -> Result<u64> {
    tx.count_from_table("file_tag")
}

pub fn implicit_file_tag_count(tx: &mut Transaction) -> Result<u64> {
    tx.count_from_table("implicit_file_tag")
}

fn parse_file_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileTag> {
    Ok(FileTag {
        file_id: row.get(0)?,
        tag_id: row.get(1)?,
    })
}

pub fn file_tags_by_file_id(tx: &mut Transaction, file_id: FileId) -> Result<Vec<FileTag>> {
    let sql = "
SELECT file_id, tag_id
FROM file_tag
WHERE file_id = ?1
ORDER BY tag_id";

    tx.query_vec(sql, params![file_id], parse_file_tag)
}

pub fn explicit_tag_ids(tx: &mut Transaction, file_id: FileId) -> Result<Vec<TagId>> {
    let sql = "
SELECT tag_id
FROM file_tag
WHERE file_id = ?1
ORDER BY tag_id";

    tx.query_vec(sql, params![file_id], |row| row.get(0))
}

pub fn explicit_file_tag_count(tx: &mut Transaction, file_id: FileId) -> Result<u64> {
    let sql = "SELECT count(*) FROM file_tag WHERE file_id = ?1";
    let count: Option<i64> = tx.query_single(sql, params![file_id], |row| row.get(0))?;
    Ok(count.unwrap_or(0) as u64)
}

/// Files explicitly tagged with any of the given tags.
pub fn file_ids_with_explicit_tags(tx: &mut Transaction, tag_ids: &[TagId]) -> Result<Vec<FileId>> {
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "
SELECT DISTINCT file_id
FROM file_tag
WHERE tag_id IN ({})
ORDER BY file_id",
        generate_placeholders(tag_ids.len())
    );

    tx.query_vec(&sql, rusqlite::params_from_iter(tag_ids), |row| row.get(0))
}

/// Add an explicit tagging. Returns false when it already existed.
pub fn add_file_tag(tx: &mut Transaction, file_id: FileId, tag_id: TagId) -> Result<bool> {
    let sql = "
INSERT OR IGNORE INTO file_tag (file_id, tag_id)
VALUES (?1, ?2)";

    Ok(tx.execute(sql, params![file_id, tag_id])? == 1)
}

pub fn delete_file_tag(tx: &mut Transaction, file_id: FileId, tag_id: TagId) -> Result<()> {
    let sql = "
DELETE FROM file_tag
WHERE file_id = ?1 AND tag_id = ?2";

    match tx.execute(sql, params![file_id, tag_id])? {
        1 => Ok(()),
        _ => Err(TmsuError::NotFound(format!(
            "file #{} is not tagged with tag #{}",
            file_id, tag_id
        ))),
    }
}

pub fn delete_file_tags_by_file_id(tx: &mut Transaction, file_id: FileId) -> Result<usize> {
    tx.execute("DELETE FROM file_tag WHERE file_id = ?1", params![file_id])
}

pub fn delete_file_tags_by_tag_id(tx: &mut Transaction, tag_id: TagId) -> Result<usize> {
    tx.execute("DELETE FROM file_tag WHERE tag_id = ?1", params![tag_id])
}

/// Duplicate every explicit tagging of `src_tag_id` onto `dest_tag_id`.
pub fn copy_file_tags(tx: &mut Transaction, src_tag_id: TagId, dest_tag_id: TagId) -> Result<usize> {
    let sql = "
INSERT INTO file_tag (file_id, tag_id)
SELECT file_id, ?2
FROM file_tag
WHERE tag_id = ?1";

    tx.execute(sql, params![src_tag_id, dest_tag_id])
}

/// Retarget explicit taggings of `src_tag_id` onto `dest_tag_id`,
/// dropping those that would duplicate an existing tagging.
pub fn merge_file_tags(tx: &mut Transaction, src_tag_id: TagId, dest_tag_id: TagId) -> Result<()> {
    let sql = "
INSERT OR IGNORE INTO file_tag (file_id, tag_id)
SELECT file_id, ?2
FROM file_tag
WHERE tag_id = ?1";

    tx.execute(sql, params![src_tag_id, dest_tag_id])?;
    delete_file_tags_by_tag_id(tx, src_tag_id)?;
    Ok(())
}

fn parse_implicit(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImplicitFileTag> {
    Ok(ImplicitFileTag {
        file_id: row.get(0)?,
        tag_id: row.get(1)?,
        source_tag_id: row.get(2)?,
    })
}

pub fn implicit_file_tags_by_file_id(
    tx: &mut Transaction,
    file_id: FileId,
) -> Result<Vec<ImplicitFileTag>> {
    let sql = "
SELECT file_id, tag_id, source_tag_id
FROM implicit_file_tag
WHERE file_id = ?1
ORDER BY tag_id";

    tx.query_vec(sql, params![file_id], parse_implicit)
}

/// Swap the materialised implicit taggings of one file for a freshly
/// derived set, atomically within the enclosing transaction.
pub fn replace_implicit_for_file(
    tx: &mut Transaction,
    file_id: FileId,
    derived: &[(TagId, TagId)],
) -> Result<()> {
    tx.execute(
        "DELETE FROM implicit_file_tag WHERE file_id = ?1",
        params![file_id],
    )?;

    let sql = "
INSERT INTO implicit_file_tag (file_id, tag_id, source_tag_id)
VALUES (?1, ?2, ?3)";

    for (tag_id, source_tag_id) in derived {
        tx.execute(sql, params![file_id, tag_id, source_tag_id])?;
    }
    Ok(())
}

pub fn delete_implicit_by_file_id(tx: &mut Transaction, file_id: FileId) -> Result<usize> {
    tx.execute(
        "DELETE FROM implicit_file_tag WHERE file_id = ?1",
        params![file_id],
    )
}

/// Remove implicit taggings mentioning the tag, as implied tag or source.
pub fn delete_implicit_by_tag_id(tx: &mut Transaction, tag_id: TagId) -> Result<usize> {
    tx.execute(
        "DELETE FROM implicit_file_tag WHERE tag_id = ?1 OR source_tag_id = ?1",
        params![tag_id],
    )
}

/// The effective tag set of a file: explicit taggings united with the
/// materialised implicit ones.
pub fn effective_tags_of_file(tx: &mut Transaction, file_id: FileId) -> Result<Vec<(Tag, bool)>> {
    let sql = "
SELECT tag.id, tag.name, 0 AS implicit
FROM tag
INNER JOIN file_tag ON file_tag.tag_id = tag.id
WHERE file_tag.file_id = ?1
UNION
SELECT tag.id, tag.name, 1 AS implicit
FROM tag
INNER JOIN implicit_file_tag ON implicit_file_tag.tag_id = tag.id
WHERE implicit_file_tag.file_id = ?1
ORDER BY name";

    tx.query_vec(sql, params![file_id], |row| {
        Ok((
            Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            },
            row.get::<_, i64>(2)? != 0,
        ))
    })
}

/// Every tag effective on at least one of the given files.
pub fn tags_for_file_ids(tx: &mut Transaction, file_ids: &[FileId]) -> Result<Vec<Tag>> {
    if file_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = generate_placeholders(file_ids.len());
    let sql = format!(
        "
SELECT DISTINCT tag.id, tag.name
FROM tag
INNER JOIN (SELECT tag_id, file_id FROM file_tag
            UNION
            SELECT tag_id, file_id FROM implicit_file_tag) ft
        ON ft.tag_id = tag.id
WHERE ft.file_id IN ({})
ORDER BY name",
        placeholders
    );

    let mut params: Vec<i64> = Vec::with_capacity(file_ids.len());
    for id in file_ids {
        params.push(id.0);
    }

    tx.query_vec(&sql, rusqlite::params_from_iter(params), |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
}
