//! Implication engine
//!
//! Maintains the materialised implicit-tagging table. For a file with
//! explicit tag set E, the effective set is the smallest superset of E
//! closed under the implication edges; the implicit rows are exactly the
//! closure minus E, each labelled with the explicit tag it was first
//! reached from.
//!
//! The graph may contain cycles: the breadth-first traversal marks visited
//! tags, so closure computation always terminates. Traversal is seeded with
//! the explicit tags in ascending ID order and expands neighbours in
//! ascending ID order, which makes the source attribution deterministic.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::entities::{FileId, TagId};
use crate::error::Result;
use crate::storage::{self, Transaction};

type Adjacency = BTreeMap<TagId, Vec<TagId>>;

/// Recompute the implicit taggings of a single file.
pub fn refresh_file(tx: &mut Transaction, file_id: FileId) -> Result<()> {
    refresh_files(tx, &[file_id])
}

/// Recompute the implicit taggings of the given files, loading the edge
/// table once.
pub fn refresh_files(tx: &mut Transaction, file_ids: &[FileId]) -> Result<()> {
    if file_ids.is_empty() {
        return Ok(());
    }

    let adjacency = forward_edges(tx)?;

    for &file_id in file_ids {
        let explicit = storage::filetag::explicit_tag_ids(tx, file_id)?;
        let derived = closure_sources(&adjacency, &explicit);
        storage::filetag::replace_implicit_for_file(tx, file_id, &derived)?;
        tracing::debug!(
            "file #{}: {} explicit, {} implied",
            file_id,
            explicit.len(),
            derived.len()
        );
    }

    Ok(())
}

/// The files whose implicit taggings may change when the implication graph
/// changes around the given tags: every file explicitly tagged with a tag
/// in the transitive predecessor set of any endpoint (endpoints included).
pub fn affected_file_ids(tx: &mut Transaction, endpoints: &[TagId]) -> Result<Vec<FileId>> {
    let reverse = reverse_edges(tx)?;
    let preds = reachable(&reverse, endpoints);
    let preds: Vec<TagId> = preds.into_iter().collect();
    storage::filetag::file_ids_with_explicit_tags(tx, &preds)
}

/// Recompute implicit taggings for every file affected by a change around
/// the given tags.
pub fn refresh_affected_by(tx: &mut Transaction, endpoints: &[TagId]) -> Result<usize> {
    let affected = affected_file_ids(tx, endpoints)?;
    refresh_files(tx, &affected)?;
    Ok(affected.len())
}

fn forward_edges(tx: &mut Transaction) -> Result<Adjacency> {
    let mut adjacency = Adjacency::new();
    for (implying, implied) in storage::implication::all_edges(tx)? {
        adjacency.entry(implying).or_default().push(implied);
    }
    Ok(adjacency)
}

fn reverse_edges(tx: &mut Transaction) -> Result<Adjacency> {
    let mut adjacency = Adjacency::new();
    for (implying, implied) in storage::implication::all_edges(tx)? {
        adjacency.entry(implied).or_default().push(implying);
    }
    Ok(adjacency)
}

/// Breadth-first closure over `adjacency` from the explicit set, returning
/// `(implied tag, source tag)` pairs for the closure minus the explicit set.
///
/// `explicit` must be sorted ascending.
fn closure_sources(adjacency: &Adjacency, explicit: &[TagId]) -> Vec<(TagId, TagId)> {
    let explicit_set: BTreeSet<TagId> = explicit.iter().copied().collect();

    let mut source: BTreeMap<TagId, TagId> = BTreeMap::new();
    let mut queue: VecDeque<TagId> = VecDeque::new();
    for &tag_id in explicit {
        source.insert(tag_id, tag_id);
        queue.push_back(tag_id);
    }

    while let Some(current) = queue.pop_front() {
        let current_source = source[&current];
        let Some(neighbours) = adjacency.get(&current) else {
            continue;
        };
        for &next in neighbours {
            if !source.contains_key(&next) {
                source.insert(next, current_source);
                queue.push_back(next);
            }
        }
    }

    source
        .into_iter()
        .filter(|(tag_id, _)| !explicit_set.contains(tag_id))
        .collect()
}

/// The set of tags reachable from `seeds` (seeds included).
fn reachable(adjacency: &Adjacency, seeds: &[TagId]) -> BTreeSet<TagId> {
    let mut visited: BTreeSet<TagId> = seeds.iter().copied().collect();
    let mut queue: VecDeque<TagId> = seeds.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        let Some(neighbours) = adjacency.get(&current) else {
            continue;
        };
        for &next in neighbours {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Tag;
    use crate::storage::Store;

    fn tag(tx: &mut Transaction, name: &str) -> Tag {
        storage::tag::insert_tag(tx, name).unwrap()
    }

    fn file(tx: &mut Transaction, name: &str) -> FileId {
        storage::file::insert_file(tx, "/tmp", name, "", 0, 0)
            .unwrap()
            .id
    }

    fn implicit_ids(tx: &mut Transaction, file_id: FileId) -> Vec<(TagId, TagId)> {
        storage::filetag::implicit_file_tags_by_file_id(tx, file_id)
            .unwrap()
            .into_iter()
            .map(|ift| (ift.tag_id, ift.source_tag_id))
            .collect()
    }

    #[test]
    fn materialises_transitive_closure() {
        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let mp3 = tag(&mut tx, "mp3");
        let audio = tag(&mut tx, "audio");
        let media = tag(&mut tx, "media");
        storage::implication::add_implication(&mut tx, mp3.id, audio.id).unwrap();
        storage::implication::add_implication(&mut tx, audio.id, media.id).unwrap();

        let f = file(&mut tx, "a.mp3");
        storage::filetag::add_file_tag(&mut tx, f, mp3.id).unwrap();
        refresh_file(&mut tx, f).unwrap();

        assert_eq!(
            implicit_ids(&mut tx, f),
            vec![(audio.id, mp3.id), (media.id, mp3.id)]
        );
    }

    #[test]
    fn explicit_tags_never_appear_implicitly() {
        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let a = tag(&mut tx, "a");
        let b = tag(&mut tx, "b");
        storage::implication::add_implication(&mut tx, a.id, b.id).unwrap();

        let f = file(&mut tx, "f");
        storage::filetag::add_file_tag(&mut tx, f, a.id).unwrap();
        storage::filetag::add_file_tag(&mut tx, f, b.id).unwrap();
        refresh_file(&mut tx, f).unwrap();

        assert_eq!(implicit_ids(&mut tx, f), vec![]);
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let a = tag(&mut tx, "a");
        let b = tag(&mut tx, "b");
        let c = tag(&mut tx, "c");
        storage::implication::add_implication(&mut tx, a.id, b.id).unwrap();
        storage::implication::add_implication(&mut tx, b.id, c.id).unwrap();
        storage::implication::add_implication(&mut tx, c.id, a.id).unwrap();

        let f = file(&mut tx, "f");
        storage::filetag::add_file_tag(&mut tx, f, a.id).unwrap();
        refresh_file(&mut tx, f).unwrap();

        assert_eq!(
            implicit_ids(&mut tx, f),
            vec![(b.id, a.id), (c.id, a.id)]
        );
    }

    #[test]
    fn source_ties_break_to_lowest_tag_id() {
        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        let first = tag(&mut tx, "first");
        let second = tag(&mut tx, "second");
        let shared = tag(&mut tx, "shared");
        storage::implication::add_implication(&mut tx, first.id, shared.id).unwrap();
        storage::implication::add_implication(&mut tx, second.id, shared.id).unwrap();

        let f = file(&mut tx, "f");
        storage::filetag::add_file_tag(&mut tx, f, first.id).unwrap();
        storage::filetag::add_file_tag(&mut tx, f, second.id).unwrap();
        refresh_file(&mut tx, f).unwrap();

        assert_eq!(implicit_ids(&mut tx, f), vec![(shared.id, first.id)]);
    }

    #[test]
    fn affected_files_follow_predecessors() {
        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();

        // chain: a -> b -> c; files tagged a, b and unrelated
        let a = tag(&mut tx, "a");
        let b = tag(&mut tx, "b");
        let c = tag(&mut tx, "c");
        let other = tag(&mut tx, "other");
        storage::implication::add_implication(&mut tx, a.id, b.id).unwrap();
        storage::implication::add_implication(&mut tx, b.id, c.id).unwrap();

        let fa = file(&mut tx, "fa");
        let fb = file(&mut tx, "fb");
        let fo = file(&mut tx, "fo");
        storage::filetag::add_file_tag(&mut tx, fa, a.id).unwrap();
        storage::filetag::add_file_tag(&mut tx, fb, b.id).unwrap();
        storage::filetag::add_file_tag(&mut tx, fo, other.id).unwrap();

        // A change around c affects files tagged a or b, not fo
        let affected = affected_file_ids(&mut tx, &[c.id]).unwrap();
        assert_eq!(affected, vec![fa, fb]);
    }
}
