//! tag / untag

use std::fs;

use crate::config::Config;
use crate::entities::{self, Tag};
use crate::error::{Result, TmsuError};
use crate::fingerprint;
use crate::implications;
use crate::scoped_path::{mod_time_secs, StoredPath};
use crate::storage::{self, Store, Transaction};

/// Apply tags to a file, indexing it on first contact.
pub fn run_tag(config: &Config, file_path: &str, tag_names: &[String]) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;
    let mut lines = Vec::new();

    let stored = StoredPath::resolve(file_path)?;
    let real_path = stored.to_path_buf();
    let metadata = fs::symlink_metadata(&real_path).map_err(|_| {
        TmsuError::NotFound(format!("{}: no such file", real_path.display()))
    })?;

    let file = match storage::file::file_by_path(&mut tx, &stored.dir, &stored.name)? {
        Some(file) => file,
        None => {
            let fingerprint = fingerprint::create(&real_path, config.fingerprint_algorithm)?;

            if !fingerprint.is_empty() {
                let duplicates = storage::file::files_by_fingerprint(&mut tx, &fingerprint)?;
                if let Some(other) = duplicates.first() {
                    lines.push(format!(
                        "{}: identical content to {}",
                        real_path.display(),
                        other.to_path_buf().display()
                    ));
                }
            }

            storage::file::insert_file(
                &mut tx,
                &stored.dir,
                &stored.name,
                &fingerprint,
                mod_time_secs(&metadata),
                metadata.len(),
            )?
        }
    };

    for name in tag_names {
        let tag = load_or_create_tag(&mut tx, name, &mut lines)?;
        storage::filetag::add_file_tag(&mut tx, file.id, tag.id)?;
    }

    implications::refresh_file(&mut tx, file.id)?;
    tx.commit()?;
    Ok(lines)
}

/// Remove specific tags from a file. The file row is retained even when
/// no tagging remains; repair purges missing untagged rows.
pub fn run_untag(config: &Config, file_path: &str, tag_names: &[String]) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    let (file_id, path_display) = indexed_file(&mut tx, file_path)?;

    for name in tag_names {
        let tag = existing_tag(&mut tx, name)?;
        storage::filetag::delete_file_tag(&mut tx, file_id, tag.id).map_err(|_| {
            TmsuError::NotFound(format!("{}: not tagged '{}'", path_display, name))
        })?;
    }

    implications::refresh_file(&mut tx, file_id)?;
    tx.commit()?;
    Ok(Vec::new())
}

/// Remove every explicit tagging of a file.
pub fn run_untag_all(config: &Config, file_path: &str) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    let (file_id, _) = indexed_file(&mut tx, file_path)?;

    storage::filetag::delete_file_tags_by_file_id(&mut tx, file_id)?;
    implications::refresh_file(&mut tx, file_id)?;
    tx.commit()?;
    Ok(Vec::new())
}

fn indexed_file(tx: &mut Transaction, file_path: &str) -> Result<(crate::entities::FileId, String)> {
    let stored = StoredPath::resolve(file_path)?;
    let display = stored.to_path_buf().display().to_string();

    match storage::file::file_by_path(tx, &stored.dir, &stored.name)? {
        Some(file) => Ok((file.id, display)),
        None => Err(TmsuError::NotFound(format!("{}: file not tagged", display))),
    }
}

pub(super) fn load_or_create_tag(
    tx: &mut Transaction,
    name: &str,
    lines: &mut Vec<String>,
) -> Result<Tag> {
    match storage::tag::tag_by_name(tx, name)? {
        Some(tag) => Ok(tag),
        None => {
            entities::validate_tag_name(name)?;
            let tag = storage::tag::insert_tag(tx, name)?;
            tracing::info!("new tag '{}'", name);
            lines.push(format!("new tag '{}'", name));
            Ok(tag)
        }
    }
}

pub(super) fn existing_tag(tx: &mut Transaction, name: &str) -> Result<Tag> {
    storage::tag::tag_by_name(tx, name)?
        .ok_or_else(|| TmsuError::NotFound(format!("no such tag '{}'", name)))
}
