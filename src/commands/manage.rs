//! rename / merge / copy / delete

use crate::commands::tag::existing_tag;
use crate::commands::Args;
use crate::config::Config;
use crate::entities;
use crate::error::{Result, TmsuError};
use crate::implications;
use crate::storage::{self, Store, Transaction};

/// Rename a tag in place. Taggings and implications reference the tag by
/// ID, so nothing else changes.
pub fn run_rename(config: &Config, old_name: &str, new_name: &str) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    let tag = existing_tag(&mut tx, old_name)?;
    entities::validate_tag_name(new_name)?;
    ensure_tag_free(&mut tx, new_name)?;

    storage::tag::rename_tag(&mut tx, tag.id, new_name)?;
    tx.commit()?;
    Ok(vec![format!("renamed tag '{}' to '{}'", old_name, new_name)])
}

/// Fold one or more tags into a destination tag: taggings are retargeted,
/// implications rewritten, the source tags deleted, and implicit taggings
/// recomputed for every affected file.
pub fn run_merge(config: &Config, args: &Args) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;
    let mut lines = Vec::new();

    let (src_names, dest_name) = args.positional.split_at(args.positional.len() - 1);
    let dest_name = &dest_name[0];
    let dest = existing_tag(&mut tx, dest_name)?;

    for src_name in src_names {
        if src_name == dest_name {
            return Err(TmsuError::Conflict(format!(
                "cannot merge tag '{}' into itself",
                src_name
            )));
        }

        let src = existing_tag(&mut tx, src_name)?;
        tracing::info!("merging tag '{}' into '{}'", src_name, dest_name);

        storage::filetag::merge_file_tags(&mut tx, src.id, dest.id)?;
        storage::implication::retarget_implications(&mut tx, src.id, dest.id)?;
        storage::filetag::delete_implicit_by_tag_id(&mut tx, src.id)?;
        storage::tag::delete_tag(&mut tx, src.id)?;

        lines.push(format!("merged tag '{}' into '{}'", src_name, dest_name));
    }

    implications::refresh_affected_by(&mut tx, &[dest.id])?;
    tx.commit()?;
    Ok(lines)
}

/// Duplicate a tag under a new name, copying its explicit taggings.
/// Implications are not copied.
pub fn run_copy(config: &Config, src_name: &str, dest_name: &str) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    let src = existing_tag(&mut tx, src_name)?;
    entities::validate_tag_name(dest_name)?;
    ensure_tag_free(&mut tx, dest_name)?;

    let dest = storage::tag::insert_tag(&mut tx, dest_name)?;
    let copied = storage::filetag::copy_file_tags(&mut tx, src.id, dest.id)?;
    implications::refresh_affected_by(&mut tx, &[dest.id])?;

    tx.commit()?;
    Ok(vec![format!(
        "copied tag '{}' to '{}' ({} taggings)",
        src_name, dest_name, copied
    )])
}

/// Delete tags, cascading over taggings and implications. File rows are
/// retained; repair purges those that are both missing and untagged.
pub fn run_delete(config: &Config, names: &[String]) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;
    let mut lines = Vec::new();

    for name in names {
        let tag = existing_tag(&mut tx, name)?;

        // Affected files must be captured while the edges still exist
        let affected = implications::affected_file_ids(&mut tx, &[tag.id])?;

        storage::filetag::delete_file_tags_by_tag_id(&mut tx, tag.id)?;
        storage::filetag::delete_implicit_by_tag_id(&mut tx, tag.id)?;
        storage::implication::delete_implications_by_tag_id(&mut tx, tag.id)?;
        storage::tag::delete_tag(&mut tx, tag.id)?;

        implications::refresh_files(&mut tx, &affected)?;
        lines.push(format!("deleted tag '{}'", name));
    }

    tx.commit()?;
    Ok(lines)
}

fn ensure_tag_free(tx: &mut Transaction, name: &str) -> Result<()> {
    if storage::tag::tag_by_name(tx, name)?.is_some() {
        return Err(TmsuError::AlreadyExists(format!(
            "tag '{}' already exists",
            name
        )));
    }
    Ok(())
}
