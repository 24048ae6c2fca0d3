//! status / untagged / stats

use std::collections::BTreeSet;
use std::fs;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Result;
use crate::scoped_path::{mod_time_secs, StoredPath};
use crate::storage::{self, Store};

/// Classify indexed files (and, when paths are given, files on disk
/// beneath them) without mutating anything:
///     T tagged and unchanged
///     M tagged but modified
///     ! tagged but missing
///     U present but untagged
pub fn run_status(config: &Config, paths: &[String]) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;
    let mut lines = Vec::new();

    let db_files = if paths.is_empty() {
        storage::file::all_files(&mut tx)?
    } else {
        let mut files = Vec::new();
        for path in paths {
            let stored = StoredPath::resolve(path)?;
            files.extend(storage::file::files_under(
                &mut tx,
                &stored.to_path_buf().to_string_lossy(),
            )?);
            if let Some(row) = storage::file::file_by_path(&mut tx, &stored.dir, &stored.name)? {
                files.push(row);
            }
        }
        files
    };

    let mut indexed = BTreeSet::new();
    for db_file in &db_files {
        let path = db_file.to_path_buf();
        indexed.insert(path.clone());

        match fs::symlink_metadata(&path) {
            Err(_) => lines.push(format!("! {}", path.display())),
            Ok(metadata) => {
                if metadata.len() == db_file.size && mod_time_secs(&metadata) == db_file.mod_time {
                    lines.push(format!("T {}", path.display()));
                } else {
                    lines.push(format!("M {}", path.display()));
                }
            }
        }
    }

    for path in paths {
        let stored = StoredPath::resolve(path)?;
        for entry in walk_visible(&stored.to_path_buf()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let entry_path = StoredPath::resolve(entry.path())?.to_path_buf();
            if !indexed.contains(&entry_path) {
                lines.push(format!("U {}", entry_path.display()));
            }
        }
    }

    Ok(lines)
}

/// List files beneath the given paths that are not in the index.
pub fn run_untagged(config: &Config, paths: &[String]) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;
    let mut lines = Vec::new();

    for path in paths {
        let stored = StoredPath::resolve(path)?;
        for entry in walk_visible(&stored.to_path_buf()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let entry_stored = StoredPath::resolve(entry.path())?;
            if storage::file::file_by_path(&mut tx, &entry_stored.dir, &entry_stored.name)?
                .is_none()
            {
                lines.push(entry_stored.to_path_buf().display().to_string());
            }
        }
    }

    Ok(lines)
}

/// Walk a directory, pruning hidden files and directories.
fn walk_visible(root: &std::path::Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|e| e.ok())
}

/// Report index counts.
pub fn run_stats(config: &Config) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    Ok(vec![
        format!("files: {}", storage::file::file_count(&mut tx)?),
        format!("tags: {}", storage::tag::tag_count(&mut tx)?),
        format!("taggings: {}", storage::filetag::file_tag_count(&mut tx)?),
        format!(
            "implicit taggings: {}",
            storage::filetag::implicit_file_tag_count(&mut tx)?
        ),
        format!(
            "implications: {}",
            storage::implication::implication_count(&mut tx)?
        ),
    ])
}
