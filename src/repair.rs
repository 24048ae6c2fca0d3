//! Index reconciliation
//!
//! Compares the index against the real filesystem and rewrites it: rows
//! whose file changed get a fresh fingerprint, rows whose file vanished are
//! matched by fingerprint against untracked files found by walking (move
//! detection), and missing rows without explicit taggings are purged.
//! Everything runs inside the enclosing transaction, so a failure aborts
//! every change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entities::File;
use crate::error::Result;
use crate::fingerprint::{self, Algorithm};
use crate::scoped_path::{mod_time_secs, StoredPath};
use crate::storage::{self, Transaction};

#[derive(Debug, Default)]
pub struct RepairReport {
    pub checked: u64,
    pub unchanged: u64,
    pub modified: u64,
    pub moved: u64,
    pub missing_kept: u64,
    pub missing_removed: u64,
    /// One line per notable file: modified, moved, missing, removed.
    pub actions: Vec<String>,
    /// Per-file problems collected along the way; the repair still commits.
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct RepairOptions {
    /// Restrict the repair to index rows under this path, and walk it for
    /// move candidates. Without it, every index row is checked and the walk
    /// covers the directories already known to the index.
    pub root: Option<PathBuf>,
    /// Additional directories to walk for move candidates.
    pub search_paths: Vec<PathBuf>,
    /// Report without mutating the index.
    pub pretend: bool,
}

pub fn repair(
    tx: &mut Transaction,
    algorithm: Algorithm,
    options: &RepairOptions,
) -> Result<RepairReport> {
    let mut report = RepairReport::default();

    let db_files = match &options.root {
        Some(root) => {
            let stored = StoredPath::resolve(root)?;
            let mut files =
                storage::file::files_under(tx, &stored.to_path_buf().to_string_lossy())?;
            if let Some(row) = storage::file::file_by_path(tx, &stored.dir, &stored.name)? {
                if !files.iter().any(|f| f.id == row.id) {
                    files.push(row);
                }
            }
            files
        }
        None => storage::file::all_files(tx)?,
    };

    report.checked = db_files.len() as u64;
    tracing::info!("repair: checking {} index rows", report.checked);

    let statuses = determine_statuses(&db_files);

    for db_file in &statuses.modified {
        let path = db_file.to_path_buf();
        match refresh_row(tx, algorithm, db_file, &path, options.pretend) {
            Ok(()) => {
                report.modified += 1;
                report
                    .actions
                    .push(format!("{}: updated fingerprint", path.display()));
            }
            Err(e) => report.errors.push(format!("{}: {}", path.display(), e)),
        }
    }
    report.unchanged = statuses.unchanged.len() as u64;

    let mut still_missing = statuses.missing;
    if !still_missing.is_empty() {
        detect_moves(tx, algorithm, options, &mut still_missing, &mut report)?;
    }

    for db_file in &still_missing {
        let path = db_file.to_path_buf();
        if storage::filetag::explicit_file_tag_count(tx, db_file.id)? > 0 {
            report.missing_kept += 1;
            report.actions.push(format!("{}: missing", path.display()));
        } else {
            if !options.pretend {
                storage::filetag::delete_implicit_by_file_id(tx, db_file.id)?;
                storage::file::delete_file(tx, db_file.id)?;
            }
            report.missing_removed += 1;
            report.actions.push(format!("{}: removed", path.display()));
        }
    }

    Ok(report)
}

struct Statuses<'a> {
    unchanged: Vec<&'a File>,
    modified: Vec<&'a File>,
    missing: Vec<&'a File>,
}

fn determine_statuses(db_files: &[File]) -> Statuses<'_> {
    let mut unchanged = vec![];
    let mut modified = vec![];
    let mut missing = vec![];

    for db_file in db_files {
        let path = db_file.to_path_buf();
        // symlink_metadata keeps dangling symlinks classified as present
        match std::fs::symlink_metadata(&path) {
            Err(_) => {
                tracing::debug!("{}: missing", path.display());
                missing.push(db_file);
            }
            Ok(metadata) => {
                if metadata.len() == db_file.size && mod_time_secs(&metadata) == db_file.mod_time {
                    unchanged.push(db_file);
                } else {
                    tracing::debug!("{}: modified", path.display());
                    modified.push(db_file);
                }
            }
        }
    }

    Statuses {
        unchanged,
        modified,
        missing,
    }
}

fn refresh_row(
    tx: &mut Transaction,
    algorithm: Algorithm,
    db_file: &File,
    path: &Path,
    pretend: bool,
) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    let fingerprint = fingerprint::create(path, algorithm)?;

    if !pretend {
        storage::file::update_file(
            tx,
            db_file.id,
            &db_file.dir,
            &db_file.name,
            &fingerprint,
            mod_time_secs(&metadata),
            metadata.len(),
        )?;
    }
    Ok(())
}

/// Walk the filesystem for files not present in the index, fingerprint
/// those whose size matches a missing row, and match them against the
/// index globally. Exactly one missing row with the same fingerprint is a
/// move; several are a conflict the user must resolve.
fn detect_moves(
    tx: &mut Transaction,
    algorithm: Algorithm,
    options: &RepairOptions,
    still_missing: &mut Vec<&File>,
    report: &mut RepairReport,
) -> Result<()> {
    let mut walk_roots: Vec<PathBuf> = match &options.root {
        Some(root) => vec![root.clone()],
        None => storage::file::directories(tx)?
            .into_iter()
            .map(PathBuf::from)
            .collect(),
    };
    walk_roots.extend(options.search_paths.iter().cloned());

    let mut sizes_wanted: HashMap<u64, u32> = HashMap::new();
    for db_file in still_missing.iter() {
        if !db_file.fingerprint.is_empty() {
            *sizes_wanted.entry(db_file.size).or_insert(0) += 1;
        }
    }
    if sizes_wanted.is_empty() {
        return Ok(());
    }

    for root in walk_roots {
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !sizes_wanted.contains_key(&metadata.len()) {
                continue;
            }

            let stored = StoredPath::resolve(entry.path())?;
            if storage::file::file_by_path(tx, &stored.dir, &stored.name)?.is_some() {
                // Already indexed at this location
                continue;
            }

            let fingerprint = fingerprint::create(entry.path(), algorithm)?;
            if fingerprint.is_empty() {
                continue;
            }

            let candidates: Vec<File> = storage::file::files_by_fingerprint(tx, &fingerprint)?
                .into_iter()
                .filter(|f| std::fs::symlink_metadata(f.to_path_buf()).is_err())
                .collect();

            match candidates.as_slice() {
                [] => {}
                [row] => {
                    let old_path = row.to_path_buf();
                    if !options.pretend {
                        storage::file::update_file(
                            tx,
                            row.id,
                            &stored.dir,
                            &stored.name,
                            &fingerprint,
                            mod_time_secs(&metadata),
                            metadata.len(),
                        )?;
                    }
                    report.moved += 1;
                    report.actions.push(format!(
                        "{}: moved to {}",
                        old_path.display(),
                        stored.to_path_buf().display()
                    ));

                    if let Some(pos) = still_missing.iter().position(|f| f.id == row.id) {
                        still_missing.remove(pos);
                    }
                    if let Some(count) = sizes_wanted.get_mut(&row.size) {
                        *count -= 1;
                        if *count == 0 {
                            sizes_wanted.remove(&row.size);
                        }
                    }
                    if sizes_wanted.is_empty() {
                        return Ok(());
                    }
                }
                rows => {
                    report.errors.push(format!(
                        "{}: ambiguous move, fingerprint matches {} missing files",
                        stored.to_path_buf().display(),
                        rows.len()
                    ));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use std::fs;

    fn mod_time_of(path: &Path) -> i64 {
        mod_time_secs(&fs::symlink_metadata(path).unwrap())
    }

    /// Tag a real file into the store under a fresh tag.
    fn index_file(tx: &mut Transaction, path: &Path, tag_name: &str) -> File {
        let stored = StoredPath::resolve(path).unwrap();
        let metadata = fs::symlink_metadata(path).unwrap();
        let fingerprint = fingerprint::create(path, Algorithm::Sha256).unwrap();

        let file = storage::file::insert_file(
            tx,
            &stored.dir,
            &stored.name,
            &fingerprint,
            mod_time_secs(&metadata),
            metadata.len(),
        )
        .unwrap();

        let tag = storage::tag::insert_tag(tx, tag_name).unwrap();
        storage::filetag::add_file_tag(tx, file.id, tag.id).unwrap();
        file
    }

    #[test]
    fn unchanged_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"contents").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        index_file(&mut tx, &path, "t");

        let options = RepairOptions {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let report = repair(&mut tx, Algorithm::Sha256, &options).unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.modified, 0);
        assert!(report.actions.is_empty());

        // Idempotence: a second run reports the same nothing-to-do
        let again = repair(&mut tx, Algorithm::Sha256, &options).unwrap();
        assert_eq!(again.unchanged, 1);
        assert!(again.actions.is_empty());
    }

    #[test]
    fn modified_files_get_fresh_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"before").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        let row = index_file(&mut tx, &path, "t");
        let old_fingerprint = row.fingerprint.clone();

        fs::write(&path, b"after, and longer").unwrap();

        let options = RepairOptions {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let report = repair(&mut tx, Algorithm::Sha256, &options).unwrap();

        assert_eq!(report.modified, 1);
        let updated = storage::file::file_by_id(&mut tx, row.id).unwrap().unwrap();
        assert_ne!(updated.fingerprint, old_fingerprint);
        assert_eq!(updated.size, b"after, and longer".len() as u64);
        assert_eq!(updated.mod_time, mod_time_of(&path));
    }

    #[test]
    fn renamed_files_are_tracked_by_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("x").join("f");
        let new = dir.path().join("y").join("f");
        fs::create_dir_all(old.parent().unwrap()).unwrap();
        fs::create_dir_all(new.parent().unwrap()).unwrap();
        fs::write(&old, b"moving contents").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        let row = index_file(&mut tx, &old, "t");

        fs::rename(&old, &new).unwrap();

        let options = RepairOptions {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let report = repair(&mut tx, Algorithm::Sha256, &options).unwrap();

        assert_eq!(report.moved, 1);
        assert_eq!(report.missing_kept, 0);
        let updated = storage::file::file_by_id(&mut tx, row.id).unwrap().unwrap();
        assert_eq!(
            updated.to_path_buf(),
            new.parent().unwrap().canonicalize().unwrap().join("f")
        );

        // Taggings survived the move
        assert_eq!(
            storage::filetag::explicit_file_tag_count(&mut tx, row.id).unwrap(),
            1
        );
    }

    #[test]
    fn missing_tagged_files_are_kept_untagged_ones_removed() {
        let dir = tempfile::tempdir().unwrap();
        let tagged = dir.path().join("tagged");
        let untagged = dir.path().join("untagged");
        fs::write(&tagged, b"one").unwrap();
        fs::write(&untagged, b"two").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        let kept = index_file(&mut tx, &tagged, "t");
        let gone = {
            let stored = StoredPath::resolve(&untagged).unwrap();
            storage::file::insert_file(&mut tx, &stored.dir, &stored.name, "fp", 0, 3).unwrap()
        };

        fs::remove_file(&tagged).unwrap();
        fs::remove_file(&untagged).unwrap();

        let options = RepairOptions {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let report = repair(&mut tx, Algorithm::Sha256, &options).unwrap();

        assert_eq!(report.missing_kept, 1);
        assert_eq!(report.missing_removed, 1);
        assert!(storage::file::file_by_id(&mut tx, kept.id).unwrap().is_some());
        assert!(storage::file::file_by_id(&mut tx, gone.id).unwrap().is_none());
    }

    #[test]
    fn ambiguous_moves_are_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one");
        let two = dir.path().join("two");
        fs::write(&one, b"identical").unwrap();
        fs::write(&two, b"identical").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        index_file(&mut tx, &one, "t1");
        index_file(&mut tx, &two, "t2");

        fs::remove_file(&one).unwrap();
        fs::remove_file(&two).unwrap();
        fs::write(dir.path().join("new"), b"identical").unwrap();

        let options = RepairOptions {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let report = repair(&mut tx, Algorithm::Sha256, &options).unwrap();

        assert_eq!(report.moved, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.missing_kept, 2);
    }

    #[test]
    fn pretend_leaves_the_index_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"before").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        let row = index_file(&mut tx, &path, "t");

        fs::write(&path, b"after, and longer").unwrap();

        let options = RepairOptions {
            root: Some(dir.path().to_path_buf()),
            pretend: true,
            ..Default::default()
        };
        let report = repair(&mut tx, Algorithm::Sha256, &options).unwrap();

        assert_eq!(report.modified, 1);
        let unchanged = storage::file::file_by_id(&mut tx, row.id).unwrap().unwrap();
        assert_eq!(unchanged.fingerprint, row.fingerprint);
    }
}
