//! Virtual filesystem projection
//!
//! Serves the tag index as a navigable directory tree. Every tag is a
//! directory at the root; descending into tags narrows the result set by
//! intersection, and the reserved `queries` directory evaluates free-form
//! expressions named by its sub-directories. Files appear as symbolic
//! links to their real location, so the kernel streams bytes from the
//! underlying filesystem and this layer never serves reads.
//!
//! Each kernel callback takes a fresh read transaction against the shared
//! store, so the projection always reflects a committed snapshot without
//! subscribing to index changes. Store failures surface as EIO, unknown
//! paths as ENOENT.

mod inode;

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyStatfs, Request,
};
use lru::LruCache;

use crate::entities::File;
use crate::error::{Result, TmsuError};
use crate::query::{self, Expression};
use crate::storage::{self, Store, Transaction};
use inode::{InodeMap, QUERIES_INODE, ROOT_INODE};

const TTL: Duration = Duration::from_secs(1);

/// Reserved name of the expression directory at the root. A user tag of
/// the same name is presented with a trailing underscore.
const QUERIES_DIR: &str = "queries";

/// Expressions seen under /queries this mount; evicted entries vanish from
/// readdir but re-resolve on lookup.
const QUERY_CACHE_CAPACITY: usize = 1000;

/// Mount the projection at `mountpoint`, blocking until unmounted.
pub fn mount(store: Store, mountpoint: &Path) -> Result<()> {
    let filesystem = TagFilesystem::new(store);

    let options = vec![
        MountOption::RO,
        MountOption::FSName("tmsu".to_string()),
        MountOption::AutoUnmount,
    ];

    tracing::info!("[vfs] mounting at {}", mountpoint.display());
    fuser::mount2(filesystem, mountpoint, &options)?;
    tracing::info!("[vfs] unmounted");
    Ok(())
}

pub struct TagFilesystem {
    store: Mutex<Store>,
    inodes: InodeMap,
    recent_queries: Mutex<LruCache<String, ()>>,
    mount_time: SystemTime,
    uid: u32,
    gid: u32,
}

/// A resolved directory: tag sub-directories and named file leaves.
struct Listing {
    subdirs: Vec<String>,
    leaves: Vec<(String, File)>,
}

impl TagFilesystem {
    pub fn new(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
            inodes: InodeMap::new(),
            recent_queries: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap(),
            )),
            mount_time: SystemTime::now(),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    /// Run a read-only transaction against the shared store.
    fn with_tx<T>(&self, f: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| TmsuError::Fatal("poisoned store lock".to_string()))?;
        let mut tx = store.begin()?;
        f(&mut tx)
    }

    fn errno(e: &TmsuError) -> i32 {
        match e {
            TmsuError::NotFound(_) => libc::ENOENT,
            _ => libc::EIO,
        }
    }

    fn dir_attr(&self, ino: u64) -> FileAttr {
        FileAttr {
            ino,
            size: 4096,
            blocks: 8,
            atime: self.mount_time,
            mtime: self.mount_time,
            ctime: self.mount_time,
            crtime: self.mount_time,
            kind: FileType::Directory,
            perm: 0o555,
            nlink: 2,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }

    /// Symlink attributes for a file leaf, reflecting the underlying
    /// file's timestamps when it is still present.
    fn leaf_attr(&self, ino: u64, file: &File) -> FileAttr {
        let target = file.to_path_buf();
        let mut attr = FileAttr {
            ino,
            size: target.as_os_str().len() as u64,
            blocks: 0,
            atime: self.mount_time,
            mtime: self.mount_time,
            ctime: self.mount_time,
            crtime: self.mount_time,
            kind: FileType::Symlink,
            perm: 0o777,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&target) {
            if let Ok(mtime) = metadata.modified() {
                attr.mtime = mtime;
                attr.ctime = mtime;
            }
            if let Ok(atime) = metadata.accessed() {
                attr.atime = atime;
            }
        }
        attr
    }

    /// Resolve a virtual path to attributes, or None for unknown paths.
    fn node_attr(&self, vpath: &str) -> Result<Option<FileAttr>> {
        if vpath == "/" {
            return Ok(Some(self.dir_attr(ROOT_INODE)));
        }
        if vpath == format!("/{}", QUERIES_DIR) {
            return Ok(Some(self.dir_attr(QUERIES_INODE)));
        }

        let segments = split_vpath(vpath);

        if segments[0] == QUERIES_DIR {
            match segments.len() {
                2 => {
                    let valid = self.with_tx(|tx| self.list_query_dir(tx, &segments[1]))?;
                    Ok(valid.map(|_| self.dir_attr(self.inodes.get_or_assign(vpath))))
                }
                3 => {
                    let listing = self.with_tx(|tx| self.list_query_dir(tx, &segments[1]))?;
                    Ok(listing.and_then(|listing| {
                        find_leaf(&listing, &segments[2])
                            .map(|file| self.leaf_attr(self.inodes.get_or_assign(vpath), &file))
                    }))
                }
                _ => Ok(None),
            }
        } else if segments.len() == 1 {
            let name = decode_root_tag(&segments[0]);
            let known = self.with_tx(|tx| Ok(storage::tag::tag_by_name(tx, &name)?.is_some()))?;
            Ok(known.then(|| self.dir_attr(self.inodes.get_or_assign(vpath))))
        } else {
            // Within a tag directory a name is preferably a co-occurring
            // tag sub-directory, otherwise a file leaf
            let parent_tags = decode_tag_segments(&segments[..segments.len() - 1]);
            let name = &segments[segments.len() - 1];

            let listing = self.with_tx(|tx| self.list_tag_dir(tx, &parent_tags))?;
            let Some(listing) = listing else {
                return Ok(None);
            };

            if listing.subdirs.iter().any(|s| s == name) {
                return Ok(Some(self.dir_attr(self.inodes.get_or_assign(vpath))));
            }
            Ok(find_leaf(&listing, name)
                .map(|file| self.leaf_attr(self.inodes.get_or_assign(vpath), &file)))
        }
    }

    /// List a tag-intersection directory. None when a path tag is unknown.
    fn list_tag_dir(&self, tx: &mut Transaction, tags: &[String]) -> Result<Option<Listing>> {
        let names: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();
        if storage::tag::tags_by_names(tx, &names)?.len() < names.len() {
            return Ok(None);
        }

        // Safe to unwrap: tag directories are at least one segment deep
        let expr = Expression::intersection_of(tags).unwrap();
        let ids = query::file_ids_matching(tx, &expr)?;
        let files = storage::file::files_by_ids(tx, &ids)?;

        let mut subdirs = Vec::new();
        for tag in storage::filetag::tags_for_file_ids(tx, &ids)? {
            if !tags.contains(&tag.name) {
                subdirs.push(tag.name);
            }
        }

        Ok(Some(Listing {
            subdirs,
            leaves: name_leaves(files),
        }))
    }

    /// List an expression directory. None when the segment does not decode
    /// to a parseable, non-blank expression.
    fn list_query_dir(&self, tx: &mut Transaction, raw: &str) -> Result<Option<Listing>> {
        let decoded = url_decode(raw);
        let expr = match Expression::parse(&decoded) {
            Ok(Some(expr)) => expr,
            Ok(None) | Err(_) => return Ok(None),
        };

        let ids = query::file_ids_matching(tx, &expr)?;
        let files = storage::file::files_by_ids(tx, &ids)?;

        Ok(Some(Listing {
            subdirs: Vec::new(),
            leaves: name_leaves(files),
        }))
    }

    /// The underlying file behind a leaf virtual path, if any.
    fn leaf_target(&self, vpath: &str) -> Result<Option<File>> {
        let segments = split_vpath(vpath);
        if segments.len() < 2 {
            return Ok(None);
        }

        let name = &segments[segments.len() - 1];
        if segments[0] == QUERIES_DIR {
            if segments.len() != 3 {
                return Ok(None);
            }
            let listing = self.with_tx(|tx| self.list_query_dir(tx, &segments[1]))?;
            Ok(listing.and_then(|listing| find_leaf(&listing, name)))
        } else {
            let parent_tags = decode_tag_segments(&segments[..segments.len() - 1]);
            let listing = self.with_tx(|tx| self.list_tag_dir(tx, &parent_tags))?;
            Ok(listing.and_then(|listing| find_leaf(&listing, name)))
        }
    }

    /// Directory entries for readdir, already including "." and "..".
    fn directory_entries(&self, vpath: &str) -> Result<Option<Vec<(u64, FileType, String)>>> {
        let own_inode = self.inodes.get_or_assign(vpath);
        let mut entries = vec![
            (own_inode, FileType::Directory, ".".to_string()),
            (own_inode, FileType::Directory, "..".to_string()),
        ];

        if vpath == "/" {
            entries.push((QUERIES_INODE, FileType::Directory, QUERIES_DIR.to_string()));
            let tags = self.with_tx(|tx| storage::tag::all_tags(tx))?;
            for tag in tags {
                let display = display_root_tag(&tag.name);
                let child = self.inodes.get_or_assign(&format!("/{}", display));
                entries.push((child, FileType::Directory, display));
            }
            return Ok(Some(entries));
        }

        if vpath == format!("/{}", QUERIES_DIR) {
            let recent = self.recent_queries.lock().unwrap();
            for (raw, _) in recent.iter() {
                let child = self.inodes.get_or_assign(&format!("/{}/{}", QUERIES_DIR, raw));
                entries.push((child, FileType::Directory, raw.clone()));
            }
            return Ok(Some(entries));
        }

        let segments = split_vpath(vpath);
        let listing = if segments[0] == QUERIES_DIR {
            if segments.len() != 2 {
                return Ok(None);
            }
            self.with_tx(|tx| self.list_query_dir(tx, &segments[1]))?
        } else {
            let tags = decode_tag_segments(&segments);
            self.with_tx(|tx| self.list_tag_dir(tx, &tags))?
        };

        let Some(listing) = listing else {
            return Ok(None);
        };

        for subdir in &listing.subdirs {
            let child = self.inodes.get_or_assign(&join_vpath(vpath, subdir));
            entries.push((child, FileType::Directory, subdir.clone()));
        }
        for (display, _) in &listing.leaves {
            // A tag sub-directory shadows a leaf of the same name
            if listing.subdirs.iter().any(|s| s == display) {
                continue;
            }
            let child = self.inodes.get_or_assign(&join_vpath(vpath, display));
            entries.push((child, FileType::Symlink, display.clone()));
        }

        Ok(Some(entries))
    }
}

impl Filesystem for TagFilesystem {
    fn init(
        &mut self,
        _req: &Request,
        _config: &mut fuser::KernelConfig,
    ) -> std::result::Result<(), i32> {
        tracing::info!("[vfs] initialized");
        Ok(())
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(parent_vpath) = self.inodes.resolve(parent) else {
            reply.error(libc::ENOENT);
            return;
        };

        // "." and ".." resolve to the directory itself, which is enough
        // for path walking
        let vpath = match name {
            "." | ".." => parent_vpath.clone(),
            _ => join_vpath(&parent_vpath, name),
        };

        match self.node_attr(&vpath) {
            Ok(Some(attr)) => {
                // Remember valid expressions so /queries can list them
                if parent_vpath == format!("/{}", QUERIES_DIR) && name != "." && name != ".." {
                    self.recent_queries.lock().unwrap().put(name.to_string(), ());
                }
                reply.entry(&TTL, &attr, 0);
            }
            Ok(None) => reply.error(libc::ENOENT),
            Err(e) => {
                tracing::warn!("[vfs] lookup {} failed: {}", vpath, e);
                reply.error(Self::errno(&e));
            }
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let Some(vpath) = self.inodes.resolve(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.node_attr(&vpath) {
            Ok(Some(attr)) => reply.attr(&TTL, &attr),
            Ok(None) => reply.error(libc::ENOENT),
            Err(e) => {
                tracing::warn!("[vfs] getattr {} failed: {}", vpath, e);
                reply.error(Self::errno(&e));
            }
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(vpath) = self.inodes.resolve(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let entries = match self.directory_entries(&vpath) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                reply.error(libc::ENOENT);
                return;
            }
            Err(e) => {
                tracing::warn!("[vfs] readdir {} failed: {}", vpath, e);
                reply.error(Self::errno(&e));
                return;
            }
        };

        for (i, (ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
            if reply.add(*ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        let Some(vpath) = self.inodes.resolve(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.leaf_target(&vpath) {
            Ok(Some(file)) => {
                let target = file.to_path_buf();
                reply.data(target.to_string_lossy().as_bytes());
            }
            Ok(None) => reply.error(libc::ENOENT),
            Err(e) => {
                tracing::warn!("[vfs] readlink {} failed: {}", vpath, e);
                reply.error(Self::errno(&e));
            }
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(0, 0, 0, 0, 0, 512, 255, 0);
    }

    fn access(&mut self, _req: &Request, _ino: u64, _mask: i32, reply: ReplyEmpty) {
        // The projection is world-readable and read-only
        reply.ok();
    }
}

fn split_vpath(vpath: &str) -> Vec<String> {
    vpath
        .trim_start_matches('/')
        .split('/')
        .map(|s| s.to_string())
        .collect()
}

fn join_vpath(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// True for "queries", "queries_", "queries__" and so on.
fn in_queries_family(name: &str) -> bool {
    name.strip_prefix(QUERIES_DIR)
        .map_or(false, |rest| rest.chars().all(|c| c == '_'))
}

/// Root-level display name for a tag. The reserved entry wins a name
/// collision, so a tag named "queries" gains a trailing underscore; to
/// keep the mapping bijective, so does every tag already carrying the
/// reserved name plus underscores ("queries_" shows as "queries__").
fn display_root_tag(name: &str) -> String {
    if in_queries_family(name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

fn decode_root_tag(segment: &str) -> String {
    match segment.strip_suffix('_') {
        Some(stripped) if in_queries_family(stripped) => stripped.to_string(),
        _ => segment.to_string(),
    }
}

/// Decode path segments into tag names. The underscore escape only
/// applies at the root, where "queries" is reserved.
fn decode_tag_segments(segments: &[String]) -> Vec<String> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if i == 0 {
                decode_root_tag(segment)
            } else {
                segment.clone()
            }
        })
        .collect()
}

/// Name the leaves of a directory: files ordered by basename then file
/// ID; within a basename collision the lowest ID keeps the bare name and
/// the k-th subsequent file gets ".k" appended.
fn name_leaves(mut files: Vec<File>) -> Vec<(String, File)> {
    files.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let mut leaves: Vec<(String, File)> = Vec::with_capacity(files.len());
    let mut position_in_group = 0;

    for (i, file) in files.into_iter().enumerate() {
        if i > 0 && leaves[i - 1].1.name == file.name {
            position_in_group += 1;
        } else {
            position_in_group = 0;
        }

        let display = if position_in_group == 0 {
            file.name.clone()
        } else {
            format!("{}.{}", file.name, position_in_group)
        };
        leaves.push((display, file));
    }

    leaves
}

fn find_leaf(listing: &Listing, name: &str) -> Option<File> {
    listing
        .leaves
        .iter()
        .find(|(display, _)| display == name)
        .map(|(_, file)| file.clone())
}

/// Decode %XX escapes; malformed escapes pass through untouched.
fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(high * 16 + low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FileId;

    fn file(id: i64, name: &str) -> File {
        File {
            id: FileId(id),
            dir: "/music".to_string(),
            name: name.to_string(),
            fingerprint: String::new(),
            mod_time: 0,
            size: 0,
        }
    }

    #[test]
    fn leaves_are_ordered_by_basename_then_id() {
        let leaves = name_leaves(vec![file(3, "b"), file(1, "c"), file(2, "a")]);
        let names: Vec<&str> = leaves.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn collisions_get_numeric_suffixes_in_id_order() {
        let leaves = name_leaves(vec![file(9, "f"), file(2, "f"), file(5, "f"), file(1, "g")]);
        let named: Vec<(&str, i64)> = leaves.iter().map(|(n, f)| (n.as_str(), f.id.0)).collect();
        assert_eq!(
            named,
            vec![("f", 2), ("f.1", 5), ("f.2", 9), ("g", 1)]
        );
    }

    #[test]
    fn reserved_root_name_is_escaped() {
        assert_eq!(display_root_tag("queries"), "queries_");
        assert_eq!(display_root_tag("jazz"), "jazz");
        assert_eq!(decode_root_tag("queries_"), "queries");
        assert_eq!(decode_root_tag("jazz"), "jazz");

        // Tags already in the reserved family shift by one underscore,
        // so display stays injective and decode is its exact inverse
        assert_eq!(display_root_tag("queries_"), "queries__");
        assert_eq!(display_root_tag("queries__"), "queries___");
        assert_eq!(decode_root_tag("queries__"), "queries_");
        assert_eq!(decode_root_tag("queries___"), "queries__");

        // Unrelated trailing underscores pass through untouched
        assert_eq!(display_root_tag("jazz_"), "jazz_");
        assert_eq!(decode_root_tag("jazz_"), "jazz_");
        assert_eq!(decode_root_tag("queriesx_"), "queriesx_");

        for name in ["queries", "queries_", "queries__", "jazz", "jazz_"] {
            assert_eq!(decode_root_tag(&display_root_tag(name)), name);
        }
    }

    #[test]
    fn decodes_url_escapes() {
        assert_eq!(url_decode("jazz%20and%20mp3"), "jazz and mp3");
        assert_eq!(url_decode("a%28b%29"), "a(b)");
        assert_eq!(url_decode("plain"), "plain");
        // Malformed escapes pass through
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
    }

    #[test]
    fn vpath_helpers() {
        assert_eq!(join_vpath("/", "jazz"), "/jazz");
        assert_eq!(join_vpath("/jazz", "mp3"), "/jazz/mp3");
        assert_eq!(split_vpath("/jazz/mp3"), vec!["jazz", "mp3"]);
    }

    // Projection tests over a real store:
    //   a {jazz, flac}   b {jazz, mp3}   c {rock, mp3}
    fn fixture_fs() -> TagFilesystem {
        let mut store = Store::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();

            let jazz = storage::tag::insert_tag(&mut tx, "jazz").unwrap();
            let rock = storage::tag::insert_tag(&mut tx, "rock").unwrap();
            let flac = storage::tag::insert_tag(&mut tx, "flac").unwrap();
            let mp3 = storage::tag::insert_tag(&mut tx, "mp3").unwrap();

            let a = storage::file::insert_file(&mut tx, "/music", "a", "", 0, 0).unwrap().id;
            let b = storage::file::insert_file(&mut tx, "/music", "b", "", 0, 0).unwrap().id;
            let c = storage::file::insert_file(&mut tx, "/music", "c", "", 0, 0).unwrap().id;

            let taggings = [
                (a, [jazz.id, flac.id]),
                (b, [jazz.id, mp3.id]),
                (c, [rock.id, mp3.id]),
            ];
            for (file, tags) in taggings {
                for tag in tags {
                    storage::filetag::add_file_tag(&mut tx, file, tag).unwrap();
                }
            }

            tx.commit().unwrap();
        }
        TagFilesystem::new(store)
    }

    fn entry_names(entries: &[(u64, FileType, String)], kind: FileType) -> Vec<String> {
        entries
            .iter()
            .filter(|(_, k, name)| *k == kind && name != "." && name != "..")
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    #[test]
    fn root_lists_every_tag_and_the_queries_directory() {
        let fs = fixture_fs();
        let entries = fs.directory_entries("/").unwrap().unwrap();
        let mut dirs = entry_names(&entries, FileType::Directory);
        dirs.sort();
        assert_eq!(dirs, vec!["flac", "jazz", "mp3", "queries", "rock"]);
    }

    #[test]
    fn tag_directory_narrows_by_intersection() {
        let fs = fixture_fs();

        let entries = fs.directory_entries("/jazz").unwrap().unwrap();
        let mut dirs = entry_names(&entries, FileType::Directory);
        dirs.sort();
        assert_eq!(dirs, vec!["flac", "mp3"]);
        assert_eq!(entry_names(&entries, FileType::Symlink), vec!["a", "b"]);

        let entries = fs.directory_entries("/jazz/mp3").unwrap().unwrap();
        assert_eq!(entry_names(&entries, FileType::Directory), Vec::<String>::new());
        assert_eq!(entry_names(&entries, FileType::Symlink), vec!["b"]);
    }

    #[test]
    fn query_directory_evaluates_encoded_expressions() {
        let fs = fixture_fs();
        let entries = fs
            .directory_entries("/queries/jazz%20and%20mp3")
            .unwrap()
            .unwrap();
        assert_eq!(entry_names(&entries, FileType::Symlink), vec!["b"]);

        // Unparsable expressions do not exist
        assert!(fs.directory_entries("/queries/%28").unwrap().is_none());
    }

    #[test]
    fn tags_in_the_reserved_family_stay_resolvable() {
        let mut store = Store::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            let q = storage::tag::insert_tag(&mut tx, "queries").unwrap();
            let q1 = storage::tag::insert_tag(&mut tx, "queries_").unwrap();
            let f = storage::file::insert_file(&mut tx, "/music", "a", "", 0, 0).unwrap().id;
            storage::filetag::add_file_tag(&mut tx, f, q.id).unwrap();
            storage::filetag::add_file_tag(&mut tx, f, q1.id).unwrap();
            tx.commit().unwrap();
        }
        let fs = TagFilesystem::new(store);

        // Root shows distinct escaped entries next to the control dir
        let entries = fs.directory_entries("/").unwrap().unwrap();
        let mut dirs = entry_names(&entries, FileType::Directory);
        dirs.sort();
        assert_eq!(dirs, vec!["queries", "queries_", "queries__"]);

        // Every listed entry resolves to a directory holding the file
        for vpath in ["/queries_", "/queries__"] {
            let attr = fs.node_attr(vpath).unwrap().unwrap();
            assert_eq!(attr.kind, FileType::Directory);
            let entries = fs.directory_entries(vpath).unwrap().unwrap();
            assert_eq!(entry_names(&entries, FileType::Symlink), vec!["a"]);
        }
    }

    #[test]
    fn unknown_paths_are_absent() {
        let fs = fixture_fs();
        assert!(fs.node_attr("/bogus").unwrap().is_none());
        assert!(fs.node_attr("/jazz/bogus").unwrap().is_none());
        assert!(fs.directory_entries("/bogus").unwrap().is_none());
    }

    #[test]
    fn leaves_resolve_to_the_stored_path() {
        let fs = fixture_fs();
        let file = fs.leaf_target("/jazz/a").unwrap().unwrap();
        assert_eq!(file.to_path_buf(), std::path::PathBuf::from("/music/a"));

        let attr = fs.node_attr("/jazz/a").unwrap().unwrap();
        assert_eq!(attr.kind, FileType::Symlink);

        let attr = fs.node_attr("/jazz/mp3").unwrap().unwrap();
        assert_eq!(attr.kind, FileType::Directory);
    }
}
