//! Implication table operations
//!
//! Stores the directed tag-implication edges as a flat adjacency table.
//! Closure computation lives in the implication engine, which loads the
//! edges through `all_edges`.

use rusqlite::params;

use crate::entities::{Implication, Tag, TagId};
use crate::error::{Result, TmsuError};
use crate::storage::Transaction;

pub fn implication_count(tx: &mut Transaction) -> Result<u64> {
    tx.count_from_table("implication")
}

pub fn implications(tx: &mut Transaction) -> Result<Vec<Implication>> {
    let sql = "
SELECT tag.id, tag.name, implied_tag.id, implied_tag.name
FROM implication
INNER JOIN tag tag ON implication.tag_id = tag.id
INNER JOIN tag implied_tag ON implication.implied_tag_id = implied_tag.id
ORDER BY tag.name, implied_tag.name";

    tx.query_vec(sql, [], |row| {
        Ok(Implication {
            implying_tag: Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            },
            implied_tag: Tag {
                id: row.get(2)?,
                name: row.get(3)?,
            },
        })
    })
}

/// Every edge of the implication graph as `(implying, implied)` pairs,
/// in deterministic order.
pub fn all_edges(tx: &mut Transaction) -> Result<Vec<(TagId, TagId)>> {
    let sql = "
SELECT tag_id, implied_tag_id
FROM implication
ORDER BY tag_id, implied_tag_id";

    tx.query_vec(sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
}

/// Add an edge. Returns false when it already existed.
pub fn add_implication(tx: &mut Transaction, implying: TagId, implied: TagId) -> Result<bool> {
    let sql = "
INSERT OR IGNORE INTO implication (tag_id, implied_tag_id)
VALUES (?1, ?2)";

    Ok(tx.execute(sql, params![implying, implied])? == 1)
}

pub fn delete_implication(tx: &mut Transaction, implying: TagId, implied: TagId) -> Result<()> {
    let sql = "
DELETE FROM implication
WHERE tag_id = ?1 AND implied_tag_id = ?2";

    match tx.execute(sql, params![implying, implied])? {
        1 => Ok(()),
        _ => Err(TmsuError::NotFound(format!(
            "no implication of tag #{} by tag #{}",
            implied, implying
        ))),
    }
}

/// Remove every edge mentioning the tag, on either end.
pub fn delete_implications_by_tag_id(tx: &mut Transaction, tag_id: TagId) -> Result<usize> {
    let sql = "
DELETE FROM implication
WHERE tag_id = ?1 OR implied_tag_id = ?1";

    tx.execute(sql, params![tag_id])
}

/// Redirect every edge mentioning `src` to mention `dest` instead,
/// dropping duplicates and self-edges that the rewrite produces.
pub fn retarget_implications(tx: &mut Transaction, src: TagId, dest: TagId) -> Result<()> {
    let insert = "
INSERT OR IGNORE INTO implication (tag_id, implied_tag_id)
SELECT
    CASE tag_id WHEN ?1 THEN ?2 ELSE tag_id END,
    CASE implied_tag_id WHEN ?1 THEN ?2 ELSE implied_tag_id END
FROM implication
WHERE tag_id = ?1 OR implied_tag_id = ?1";

    tx.execute(insert, params![src, dest])?;
    delete_implications_by_tag_id(tx, src)?;
    tx.execute(
        "DELETE FROM implication WHERE tag_id = implied_tag_id",
        [],
    )?;
    Ok(())
}
