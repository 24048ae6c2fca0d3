//! Tag table operations

use rusqlite::params;

use crate::entities::{Tag, TagId};
use crate::error::{Result, TmsuError};
use crate::storage::{generate_placeholders, Transaction};

fn parse_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

pub fn tag_count(tx: &mut Transaction) -> Result<u64> {
    tx.count_from_table("tag")
}

pub fn all_tags(tx: &mut Transaction) -> Result<Vec<Tag>> {
    let sql = "
SELECT id, name
FROM tag
ORDER BY name";

    tx.query_vec(sql, [], parse_tag)
}

pub fn tag_by_name(tx: &mut Transaction, name: &str) -> Result<Option<Tag>> {
    let sql = "
SELECT id, name
FROM tag
WHERE name = ?1";

    tx.query_single(sql, params![name], parse_tag)
}

pub fn tags_by_names(tx: &mut Transaction, names: &[&str]) -> Result<Vec<Tag>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "
SELECT id, name
FROM tag
WHERE name IN ({})",
        generate_placeholders(names.len())
    );

    tx.query_vec(&sql, rusqlite::params_from_iter(names), parse_tag)
}

pub fn insert_tag(tx: &mut Transaction, name: &str) -> Result<Tag> {
    let sql = "
INSERT INTO tag (name)
VALUES (?1)";

    tx.execute(sql, params![name])?;

    Ok(Tag {
        id: TagId(tx.last_insert_row_id()),
        name: name.to_string(),
    })
}

pub fn rename_tag(tx: &mut Transaction, tag_id: TagId, new_name: &str) -> Result<()> {
    let sql = "
UPDATE tag
SET name = ?1
WHERE id = ?2";

    match tx.execute(sql, params![new_name, tag_id])? {
        1 => Ok(()),
        _ => Err(TmsuError::NotFound(format!("no such tag #{}", tag_id))),
    }
}

pub fn delete_tag(tx: &mut Transaction, tag_id: TagId) -> Result<()> {
    let sql = "DELETE FROM tag WHERE id = ?1";

    match tx.execute(sql, params![tag_id])? {
        1 => Ok(()),
        _ => Err(TmsuError::NotFound(format!("no such tag #{}", tag_id))),
    }
}
